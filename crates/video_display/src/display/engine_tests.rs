//! Engine behavior tests against the scripted backend

use std::sync::Arc;
use std::thread;

use crate::config::DisplayConfig;
use crate::display::backend::AcquireOutcome;
use crate::display::engine::DisplayEngine;
use crate::display::error::DisplayError;
use crate::display::format::{ImageDescription, PixelFormat};
use crate::display::mock::{MockBackend, MockWindow};
use crate::display::surface::WindowParameters;

fn test_config() -> DisplayConfig {
    DisplayConfig {
        filled_pop_timeout_ms: 5,
        acquire_slot_timeout_ms: 1,
        discard_push_timeout_ms: 1,
        ..DisplayConfig::default()
    }
}

fn engine_with(
    config: DisplayConfig,
    backend: MockBackend,
) -> (DisplayEngine<MockBackend>, Arc<MockWindow>) {
    let window = MockWindow::new(1280, 720);
    let engine = DisplayEngine::new(backend, window.clone(), config).unwrap();
    (engine, window)
}

fn rgba(width: u32, height: u32) -> ImageDescription {
    ImageDescription::new(width, height, PixelFormat::Rgba)
}

fn queue_tagged(engine: &DisplayEngine<MockBackend>, desc: ImageDescription, tag: u8) -> bool {
    let mut frame = engine.acquire_image(desc).unwrap();
    frame.bytes_mut()[0] = tag;
    engine.queue_image(frame, false).unwrap()
}

#[test]
fn frames_present_in_queue_order() {
    let config = DisplayConfig {
        filled_queue_capacity: 4,
        ..test_config()
    };
    let (engine, _window) = engine_with(config, MockBackend::new());
    let desc = rgba(640, 480);

    for tag in [10, 20, 30] {
        assert!(!queue_tagged(&engine, desc, tag));
    }
    for _ in 0..3 {
        assert!(engine.display_queued_image().unwrap());
    }

    let backend = engine.backend();
    let tags: Vec<u8> = backend.submits.iter().map(|s| s.tag).collect();
    assert_eq!(tags, vec![10, 20, 30]);
}

#[test]
fn display_without_frames_is_a_no_op() {
    let (engine, _window) = engine_with(test_config(), MockBackend::new());
    assert!(!engine.display_queued_image().unwrap());
    assert!(engine.backend().submits.is_empty());
}

#[test]
fn discardable_frame_drops_under_backpressure() {
    let (engine, _window) = engine_with(test_config(), MockBackend::new());
    let desc = rgba(320, 240);

    assert!(!queue_tagged(&engine, desc, 1));
    // Queue capacity is 1; the second, discardable frame must drop.
    let mut frame = engine.acquire_image(desc).unwrap();
    frame.bytes_mut()[0] = 2;
    assert!(engine.queue_image(frame, true).unwrap());
    assert_eq!(engine.filled_len(), 1);
    assert_eq!(engine.pool_total(), 3);

    assert!(engine.display_queued_image().unwrap());
    assert!(!engine.display_queued_image().unwrap());
    let backend = engine.backend();
    assert_eq!(backend.submits.len(), 1);
    assert_eq!(backend.submits[0].tag, 1);
}

#[test]
fn non_discardable_frame_waits_for_queue_space() {
    let (engine, _window) = engine_with(test_config(), MockBackend::new());
    let engine = Arc::new(engine);
    let desc = rgba(320, 240);

    assert!(!queue_tagged(&engine, desc, 1));
    let producer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || queue_tagged(&engine, desc, 2))
    };
    // Presenting frame 1 frees the queue; the blocked producer finishes.
    assert!(engine.display_queued_image().unwrap());
    assert!(!producer.join().unwrap());
    assert!(engine.display_queued_image().unwrap());

    let backend = engine.backend();
    let tags: Vec<u8> = backend.submits.iter().map(|s| s.tag).collect();
    assert_eq!(tags, vec![1, 2]);
}

#[test]
fn size_change_skips_pipeline_rebuild() {
    let (engine, _window) = engine_with(test_config(), MockBackend::new());

    assert!(!queue_tagged(&engine, rgba(640, 480), 1));
    assert!(engine.display_queued_image().unwrap());
    assert_eq!(engine.backend().reconfigure_count, 1);

    // Same format, new size: slots are recreated but the pipeline is not.
    assert!(!queue_tagged(&engine, rgba(1920, 1080), 2));
    assert!(engine.display_queued_image().unwrap());
    assert_eq!(engine.backend().reconfigure_count, 1);

    // Format change rebuilds.
    assert!(!queue_tagged(
        &engine,
        ImageDescription::new(1920, 1080, PixelFormat::Uyvy),
        3
    ));
    assert!(engine.display_queued_image().unwrap());
    assert_eq!(engine.backend().reconfigure_count, 2);
}

#[test]
fn stale_surface_recovers_within_retry_budget() {
    let mut backend = MockBackend::new();
    backend
        .acquire_script
        .extend([AcquireOutcome::Stale, AcquireOutcome::Stale, AcquireOutcome::Image(1)]);
    let (engine, _window) = engine_with(test_config(), backend);

    assert!(!queue_tagged(&engine, rgba(640, 480), 7));
    assert!(engine.display_queued_image().unwrap());

    let backend = engine.backend();
    assert_eq!(backend.recreate_count, 2);
    assert_eq!(backend.submits.len(), 1);
    assert_eq!(backend.submits[0].surface_index, 1);
}

#[test]
fn persistent_stale_surface_is_fatal() {
    let mut backend = MockBackend::new();
    backend.acquire_script.extend([AcquireOutcome::Stale; 4]);
    let (engine, _window) = engine_with(test_config(), backend);

    assert!(!queue_tagged(&engine, rgba(640, 480), 1));
    let err = engine.display_queued_image().unwrap_err();
    assert!(matches!(
        err,
        DisplayError::SurfaceUnrecoverable { attempts: 4 }
    ));
    // The frame's slot went back into circulation, not into the void.
    assert_eq!(engine.available_len(), 1);
}

#[test]
fn acquire_timeouts_count_against_the_same_budget() {
    let mut backend = MockBackend::new();
    backend.acquire_script.extend([
        AcquireOutcome::Timeout,
        AcquireOutcome::Stale,
        AcquireOutcome::Image(0),
    ]);
    let (engine, _window) = engine_with(test_config(), backend);

    assert!(!queue_tagged(&engine, rgba(640, 480), 1));
    assert!(engine.display_queued_image().unwrap());
    // Only the stale outcome forces recreation.
    assert_eq!(engine.backend().recreate_count, 1);
}

#[test]
fn minimized_window_drains_without_losing_slots() {
    let config = DisplayConfig {
        filled_queue_capacity: 4,
        ..test_config()
    };
    let (engine, window) = engine_with(config, MockBackend::new());
    let desc = rgba(640, 480);

    for tag in 1..=3 {
        assert!(!queue_tagged(&engine, desc, tag));
    }
    window.set_size(0, 0);
    assert!(!engine.display_queued_image().unwrap());

    assert_eq!(engine.filled_len(), 0);
    assert_eq!(engine.available_len(), 3);
    assert_eq!(engine.backend().submits.len(), 0);
    assert_eq!(engine.backend().images_destroyed, 0);

    // Restored window presents again.
    window.set_size(1280, 720);
    assert!(!queue_tagged(&engine, desc, 4));
    assert!(engine.display_queued_image().unwrap());
}

#[test]
fn five_discardable_frames_through_three_slots_conserve_the_pool() {
    let (engine, _window) = engine_with(test_config(), MockBackend::new());
    let desc = rgba(320, 240);

    let mut dropped = 0;
    for tag in 1..=5u8 {
        let mut frame = engine.acquire_image(desc).unwrap();
        frame.bytes_mut()[0] = tag;
        if engine.queue_image(frame, true).unwrap() {
            dropped += 1;
        }
    }
    // Queue capacity 1: exactly one frame queued, the rest dropped.
    assert_eq!(dropped, 4);
    assert_eq!(engine.pool_total(), 3);

    assert!(engine.display_queued_image().unwrap());
    assert_eq!(engine.backend().submits[0].tag, 1);

    // Every slot is accounted for: one reclaimed to available, the
    // rest back on the pool's free list.
    engine.destroy().unwrap();
    let backend = engine.backend();
    assert_eq!(backend.images_created, backend.images_destroyed);
}

#[test]
fn in_flight_frames_hold_ring_tokens_until_completion() {
    let config = DisplayConfig {
        filled_queue_capacity: 4,
        frame_resource_count: 2,
        ..test_config()
    };
    let mut backend = MockBackend::new();
    backend.auto_complete = false;
    let (engine, _window) = engine_with(config, backend);
    let desc = rgba(320, 240);

    for tag in 1..=3 {
        assert!(!queue_tagged(&engine, desc, tag));
    }
    assert!(engine.display_queued_image().unwrap());
    assert!(engine.display_queued_image().unwrap());
    assert_eq!(engine.in_flight_len(), 2);
    assert_eq!(engine.backend().pending_len(), 2);
    // Both ring tokens are out; the third frame cannot start.
    assert!(!engine.display_queued_image().unwrap());

    engine.backend().complete_oldest();
    assert!(engine.display_queued_image().unwrap());
    assert_eq!(engine.backend().submits.len(), 3);
    // The finished frame's slot flowed back to producers.
    assert_eq!(engine.available_len(), 1);
}

#[test]
fn resize_refits_render_area_without_surface_recreation() {
    let config = DisplayConfig {
        filled_queue_capacity: 4,
        ..test_config()
    };
    let (engine, window) = engine_with(config, MockBackend::new());
    let desc = rgba(640, 480);

    assert!(!queue_tagged(&engine, desc, 1));
    assert!(engine.display_queued_image().unwrap());

    window.set_size(1920, 480);
    assert!(!queue_tagged(&engine, desc, 2));
    assert!(engine.display_queued_image().unwrap());

    let backend = engine.backend();
    assert_eq!(backend.recreate_count, 0);
    // 480-tall window limits height: 480 * 640 / 480 = 640 wide, centered.
    assert_eq!(backend.submits[1].area.width, 640);
    assert_eq!(backend.submits[1].area.x, (1920 - 640) / 2);
}

#[test]
fn pushed_window_size_reaches_the_render_path() {
    let config = DisplayConfig {
        filled_queue_capacity: 4,
        ..test_config()
    };
    let (engine, _window) = engine_with(config, MockBackend::new());
    let desc = rgba(640, 480);

    // A pushed size overrides the handler's 1280x720.
    engine.window_parameters_changed(WindowParameters::new(1920, 480));
    assert!(!queue_tagged(&engine, desc, 1));
    assert!(engine.display_queued_image().unwrap());
    {
        let backend = engine.backend();
        assert_eq!(backend.submits[0].area.width, 640);
        assert_eq!(backend.submits[0].area.x, (1920 - 640) / 2);
    }

    // A pushed zero-area size behaves like a minimized window.
    assert!(!queue_tagged(&engine, desc, 2));
    engine.window_parameters_changed(WindowParameters::new(0, 0));
    assert!(!engine.display_queued_image().unwrap());
    assert_eq!(engine.filled_len(), 0);

    // Restoring the size resumes presentation.
    engine.window_parameters_changed(WindowParameters::new(1280, 720));
    assert!(!queue_tagged(&engine, desc, 3));
    assert!(engine.display_queued_image().unwrap());
}

#[test]
fn overflowing_released_queue_falls_back_to_the_pool() {
    let config = DisplayConfig {
        filled_queue_capacity: 4,
        available_queue_capacity: 1,
        ..test_config()
    };
    let (engine, _window) = engine_with(config, MockBackend::new());
    let desc = rgba(320, 240);

    for tag in 1..=3 {
        assert!(!queue_tagged(&engine, desc, tag));
    }
    // Three display cycles reclaim two finished frames into a queue
    // that only holds one; the second reclaim must land in the pool.
    for _ in 0..3 {
        assert!(engine.display_queued_image().unwrap());
    }
    assert_eq!(engine.available_len(), 1);
    assert_eq!(engine.pool_total(), 3);

    // Every slot and image is still accounted for.
    engine.destroy().unwrap();
    let backend = engine.backend();
    assert_eq!(backend.images_created, 3);
    assert_eq!(backend.images_created, backend.images_destroyed);
}

#[test]
fn unsupported_description_fails_at_acquire() {
    let desc = rgba(640, 480);
    let mut backend = MockBackend::new();
    backend.rejected.push(desc);
    let (engine, _window) = engine_with(test_config(), backend);

    assert!(!engine.is_format_supported(desc).unwrap());
    assert!(matches!(
        engine.acquire_image(desc),
        Err(DisplayError::Unsupported { .. })
    ));
    // Nothing leaked from the failed acquire.
    assert_eq!(engine.pool_total(), 3);
    assert_eq!(engine.backend().images_created, 0);
}

#[test]
fn slot_reuse_waits_out_the_gpu() {
    let mut backend = MockBackend::new();
    backend.auto_complete = false;
    let (engine, _window) = engine_with(test_config(), backend);
    let desc = rgba(320, 240);

    assert!(!queue_tagged(&engine, desc, 1));
    assert!(engine.display_queued_image().unwrap());
    engine.backend().complete_oldest();
    // Reclaim happens at the top of the next cycle.
    assert!(!engine.display_queued_image().unwrap());
    assert_eq!(engine.available_len(), 1);

    // Exhaust the local free list so acquire reuses the released slot,
    // which has been submitted before.
    let a = engine.acquire_image(desc).unwrap();
    let b = engine.acquire_image(desc).unwrap();
    let c = engine.acquire_image(desc).unwrap();
    assert_eq!(engine.pool_total(), 3);
    engine.discard_image(a);
    engine.discard_image(b);
    engine.discard_image(c);
}

#[test]
fn destroy_is_idempotent_and_frees_everything() {
    let config = DisplayConfig {
        filled_queue_capacity: 4,
        ..test_config()
    };
    let (engine, _window) = engine_with(config, MockBackend::new());
    let desc = rgba(640, 480);

    for tag in 1..=2 {
        assert!(!queue_tagged(&engine, desc, tag));
    }
    assert!(engine.display_queued_image().unwrap());

    engine.destroy().unwrap();
    engine.destroy().unwrap();

    let backend = engine.backend();
    assert!(backend.destroyed);
    assert_eq!(backend.images_created, backend.images_destroyed);
}

#[test]
fn operations_after_destroy_fail_safely() {
    let (engine, _window) = engine_with(test_config(), MockBackend::new());
    let desc = rgba(640, 480);
    let frame = engine.acquire_image(desc).unwrap();

    engine.destroy().unwrap();
    // A frame still held by a producer is swallowed, not presented.
    assert!(engine.queue_image(frame, false).unwrap());
    assert!(engine.acquire_image(desc).is_err());
    assert!(!engine.display_queued_image().unwrap());

    let backend = engine.backend();
    assert_eq!(backend.images_created, backend.images_destroyed);
}
