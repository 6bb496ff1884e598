//! Window management scenarios driven through the compositor core

mod common;

use casilda::compositor::{Edges, Rect};
use casilda::input::PointerMode;
use casilda::protocol::ClientEvent;

use common::{close_window, compositor, open_window, position, settle};

#[test]
fn test_reopened_window_restores_dragged_position_and_size() {
    let (mut state, _host) = compositor(800, 600);
    let mut events = Vec::new();

    let window = open_window(&mut state, Some("Casilda:terminal"), (200, 100));
    assert_eq!(position(&state, window), Some((32, 32)));

    // Grab the window at (50, 40) and drag it by (68, 118)
    state.pointer_motion(50.0, 40.0, &mut events);
    state.button(1, true, &mut events);
    state.request_move(window.toplevel);
    assert_eq!(state.session.mode, PointerMode::Move);
    state.pointer_motion(118.0, 158.0, &mut events);
    state.button(1, false, &mut events);
    assert_eq!(position(&state, window), Some((100, 150)));

    let saved = state.toplevels.state_of(window.toplevel).copied().unwrap();
    assert_eq!((saved.x, saved.y, saved.width, saved.height), (100, 150, 200, 100));
    close_window(&mut state, window);

    let reopened = open_window(&mut state, Some("Casilda:terminal"), (320, 240));
    assert_eq!(position(&state, reopened), Some((100, 150)));
    let toplevel = state.toplevels.get(reopened.toplevel).unwrap();
    assert_eq!((toplevel.current.width, toplevel.current.height), (200, 100));
}

#[test]
fn test_maximized_window_follows_widget_size() {
    let (mut state, _host) = compositor(800, 600);
    let window = open_window(&mut state, Some("Casilda:editor"), (200, 100));

    state.request_maximize(window.toplevel, true);
    settle(&mut state, window);
    assert!(state.toplevels.get(window.toplevel).unwrap().current.maximized);
    assert_eq!(position(&state, window), Some((0, 0)));

    let mut events = Vec::new();
    state.size_allocate(1024, 768, &mut events);
    assert!(events.contains(&ClientEvent::OutputMode {
        width: 1024,
        height: 768
    }));
    settle(&mut state, window);

    let node = state.toplevels.get(window.toplevel).unwrap().node;
    assert_eq!(state.scene.bounds(node, &state.surfaces), Rect::new(0, 0, 1024, 768));
}

#[test]
fn test_maximized_flag_survives_reopen_and_unmaximize_restores() {
    let (mut state, _host) = compositor(800, 600);
    let window = open_window(&mut state, Some("Casilda:viewer"), (200, 100));
    state.request_maximize(window.toplevel, true);
    settle(&mut state, window);
    let saved = state.toplevels.state_of(window.toplevel).copied().unwrap();
    assert!(saved.maximized);
    assert_eq!((saved.x, saved.y, saved.width, saved.height), (32, 32, 200, 100));
    close_window(&mut state, window);

    let reopened = open_window(&mut state, Some("Casilda:viewer"), (200, 100));
    let toplevel = state.toplevels.get(reopened.toplevel).unwrap();
    assert!(toplevel.current.maximized);
    assert_eq!((toplevel.current.width, toplevel.current.height), (800, 600));
    assert_eq!(position(&state, reopened), Some((0, 0)));

    state.request_maximize(reopened.toplevel, false);
    settle(&mut state, reopened);
    let toplevel = state.toplevels.get(reopened.toplevel).unwrap();
    assert!(!toplevel.current.maximized);
    assert_eq!((toplevel.current.width, toplevel.current.height), (200, 100));
    assert_eq!(position(&state, reopened), Some((32, 32)));
    assert!(!state.toplevels.state_of(reopened.toplevel).unwrap().maximized);
}

#[test]
fn test_click_transfers_focus() {
    let (mut state, host) = compositor(800, 600);
    let mut events = Vec::new();

    let first = open_window(&mut state, Some("Casilda:first"), (200, 100));
    let second = open_window(&mut state, Some("Casilda:second"), (200, 100));
    state.configure_toplevel(second.toplevel, 400, 300, 0, 0);

    assert_eq!(state.toplevels.front(), Some(second.toplevel));
    assert_eq!(state.seat.keyboard_focus(), Some(second.surface));

    state.pointer_motion(50.0, 40.0, &mut events);
    state.button(1, true, &mut events);
    state.button(1, false, &mut events);

    assert_eq!(state.toplevels.order(), &[first.toplevel, second.toplevel]);
    assert_eq!(state.seat.keyboard_focus(), Some(first.surface));
    assert!(state.toplevels.get(first.toplevel).unwrap().scheduled.activated);
    assert!(!state.toplevels.get(second.toplevel).unwrap().scheduled.activated);
    assert_eq!(host.log.borrow().focus_grabs, 1);
}

#[test]
fn test_button_release_ends_move() {
    let (mut state, _host) = compositor(800, 600);
    let mut events = Vec::new();
    let window = open_window(&mut state, Some("Casilda:dragged"), (200, 100));

    state.pointer_motion(40.0, 40.0, &mut events);
    state.button(1, true, &mut events);
    state.request_move(window.toplevel);
    assert_eq!(state.session.grabbed, Some(window.toplevel));

    state.button(1, false, &mut events);
    assert_eq!(state.session.mode, PointerMode::Forward);
    assert_eq!(state.session.grabbed, None);

    // Motion after the release no longer moves the window
    state.pointer_motion(300.0, 300.0, &mut events);
    assert_eq!(position(&state, window), Some((32, 32)));
}

#[test]
fn test_resize_respects_minimum_size() {
    let (mut state, _host) = compositor(800, 600);
    let mut events = Vec::new();
    let window = open_window(&mut state, Some("Casilda:sized"), (200, 100));
    state.set_toplevel_min_size(window.toplevel, 150, 80);
    state.commit_surface(window.surface, false, &mut events);

    // Grab the bottom-right corner
    state.pointer_motion(231.0, 131.0, &mut events);
    state.button(1, true, &mut events);
    state.request_resize(window.toplevel, Edges::BOTTOM | Edges::RIGHT);
    assert_eq!(state.session.mode, PointerMode::Resize);

    let before = state.toplevels.get(window.toplevel).unwrap().scheduled;
    state.pointer_motion(40.0, 40.0, &mut events);
    let toplevel = state.toplevels.get(window.toplevel).unwrap();
    assert_eq!(toplevel.scheduled, before);
    assert_eq!(position(&state, window), Some((32, 32)));

    // Only the width is too small: clamped with the left edge in place
    state.pointer_motion(100.0, 300.0, &mut events);
    let toplevel = state.toplevels.get(window.toplevel).unwrap();
    assert_eq!((toplevel.scheduled.width, toplevel.scheduled.height), (150, 269));
    assert_eq!(position(&state, window), Some((32, 32)));

    state.button(1, false, &mut events);
    assert_eq!(state.session.mode, PointerMode::Forward);
}

#[test]
fn test_unprefixed_app_id_is_not_persisted() {
    let (mut state, _host) = compositor(800, 600);
    let window = open_window(&mut state, Some("org.example.App"), (200, 100));

    assert_eq!(position(&state, window), Some((0, 0)));
    assert!(state.toplevels.state_of(window.toplevel).is_none());

    close_window(&mut state, window);
    assert!(state.toplevels.is_empty());
}
