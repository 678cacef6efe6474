/// Integration tests for the frame cache
/// These tests run the display path and the caching path from several
/// threads against a counting decoder and verify that no frame is decoded
/// twice and that observers are notified as expected
use framecache::{
    CacheSettings, DecodedImage, FrameDecoder, FrameIndex, HandlerObserver, NoopObserver,
    RequestedFrame, VideoHandler,
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread;
use std::time::Duration;

const WIDTH: u32 = 8;
const HEIGHT: u32 = 4;

/// Decoder that records every request and takes `delay` per frame
struct RecordingDecoder {
    delay: Duration,
    requests: Mutex<Vec<(FrameIndex, bool)>>,
}

impl RecordingDecoder {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<(FrameIndex, bool)> {
        self.requests.lock().unwrap().clone()
    }

    fn calls_for(&self, index: FrameIndex) -> usize {
        self.requests()
            .iter()
            .filter(|(requested, _)| *requested == index)
            .count()
    }
}

impl FrameDecoder for RecordingDecoder {
    fn request_frame(&self, index: FrameIndex, for_caching: bool, buffer: &mut RequestedFrame) {
        self.requests.lock().unwrap().push((index, for_caching));
        thread::sleep(self.delay);

        let shade = (index % 256) as u8;
        let image = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([shade, 0, 255 - shade, 255]));
        buffer.set(index, DecodedImage::new(image));
    }
}

/// Decoder that holds display requests until the gate is opened
#[derive(Default)]
struct GatedDecoder {
    requests: Mutex<Vec<(FrameIndex, bool)>>,
    display_entered: AtomicBool,
    open: Mutex<bool>,
    opened: Condvar,
}

impl GatedDecoder {
    fn open_gate(&self) {
        *self.open.lock().unwrap() = true;
        self.opened.notify_all();
    }

    fn calls_for(&self, index: FrameIndex) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(requested, _)| *requested == index)
            .count()
    }
}

impl FrameDecoder for GatedDecoder {
    fn request_frame(&self, index: FrameIndex, for_caching: bool, buffer: &mut RequestedFrame) {
        self.requests.lock().unwrap().push((index, for_caching));

        if !for_caching {
            self.display_entered.store(true, Ordering::SeqCst);
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.opened.wait(open).unwrap();
            }
        }

        let image = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([index as u8, 0, 0, 255]));
        buffer.set(index, DecodedImage::new(image));
    }
}

/// Observer that records every notification
#[derive(Default)]
struct RecordingObserver {
    frame_limits: AtomicUsize,
    changes: Mutex<Vec<(bool, bool)>>,
}

impl RecordingObserver {
    fn changes(&self) -> Vec<(bool, bool)> {
        self.changes.lock().unwrap().clone()
    }
}

impl HandlerObserver for RecordingObserver {
    fn frame_limits_changed(&self) {
        self.frame_limits.fetch_add(1, Ordering::SeqCst);
    }

    fn state_changed(&self, redraw: bool, recache: bool) {
        self.changes.lock().unwrap().push((redraw, recache));
    }
}

fn setup(
    delay: Duration,
    notify_interval_ms: u64,
) -> (Arc<VideoHandler>, Arc<RecordingDecoder>, Arc<RecordingObserver>) {
    let decoder = RecordingDecoder::new(delay);
    let observer = Arc::new(RecordingObserver::default());
    let settings = CacheSettings {
        notify_interval_ms,
        ..Default::default()
    };

    let handler = VideoHandler::new(decoder.clone(), observer.clone(), &settings);
    handler.set_frame_size(WIDTH, HEIGHT);

    // Setting the size reports a format change; start from a clean slate
    observer.changes.lock().unwrap().clear();
    observer.frame_limits.store(0, Ordering::SeqCst);

    (Arc::new(handler), decoder, observer)
}

#[test]
fn test_display_does_not_populate_cache() {
    let (handler, decoder, _observer) = setup(Duration::ZERO, 1000);

    assert!(handler.display_frame(5));
    assert_eq!(decoder.requests(), vec![(5, false)]);
    assert_eq!(handler.current_frame_index(), Some(5));
    assert_eq!(handler.current_image().unwrap().pixel(0, 0), Some(Rgba([5, 0, 250, 255])));
    assert_eq!(handler.cached_frame_count(), 0);
}

#[test]
fn test_cached_frame_becomes_current_without_decode() {
    let (handler, decoder, _observer) = setup(Duration::ZERO, 1000);

    assert!(handler.cache_frame(5));
    assert_eq!(decoder.requests(), vec![(5, true)]);
    assert!(handler.is_cached(5));

    assert!(handler.display_frame(5));
    assert_eq!(decoder.requests().len(), 1);
    assert_eq!(handler.current_frame_index(), Some(5));
}

#[test]
fn test_concurrent_cache_and_display_decode_once() {
    let (handler, decoder, _observer) = setup(Duration::from_millis(30), 1000);

    for index in 10..16 {
        let barrier = Arc::new(Barrier::new(2));

        let cacher = {
            let handler = Arc::clone(&handler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                handler.cache_frame(index);
            })
        };

        barrier.wait();
        let staged = handler.display_frame(index);
        cacher.join().unwrap();

        assert!(staged, "frame {} was not staged", index);
        assert_eq!(decoder.calls_for(index), 1, "frame {} decoded twice", index);
        assert_eq!(handler.current_frame_index(), Some(index));
        if let Some(cached) = handler.cached_image(index) {
            assert_eq!(handler.current_image(), Some(cached));
        }
        assert!(!handler.is_caching(index));
    }
}

#[test]
fn test_display_waits_for_in_flight_cache() {
    let (handler, decoder, _observer) = setup(Duration::from_millis(100), 1000);

    let cacher = {
        let handler = Arc::clone(&handler);
        thread::spawn(move || handler.cache_frame(3))
    };

    // Give the worker time to register its decode
    while !handler.is_caching(3) {
        thread::sleep(Duration::from_millis(1));
    }

    assert!(handler.display_frame(3));
    assert!(cacher.join().unwrap());

    assert_eq!(decoder.requests(), vec![(3, true)]);
    assert_eq!(handler.stats().in_flight_waits, 1);
    assert!(!handler.is_loading_in_background());
}

#[test]
fn test_many_callers_same_frame() {
    let (handler, decoder, _observer) = setup(Duration::from_millis(20), 1000);
    let barrier = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let handler = Arc::clone(&handler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    handler.cache_frame(42);
                } else {
                    handler.display_frame(42);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(decoder.calls_for(42), 1);
    assert!(handler.cached_frame_count() <= 1);
    assert_eq!(handler.current_frame_index(), Some(42));
    assert_eq!(handler.stats().in_flight, 0);
}

#[test]
fn test_display_decode_blocks_cache_of_same_frame_behind_other_request() {
    for _ in 0..5 {
        let decoder = Arc::new(GatedDecoder::default());
        let handler = Arc::new(VideoHandler::new(
            decoder.clone(),
            Arc::new(NoopObserver),
            &CacheSettings::default(),
        ));

        let display = {
            let handler = Arc::clone(&handler);
            thread::spawn(move || handler.display_frame(1))
        };
        while !decoder.display_entered.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }

        // Queued behind the display decode on the decoder
        let other = {
            let handler = Arc::clone(&handler);
            thread::spawn(move || handler.cache_frame(2))
        };
        while !handler.is_caching(2) {
            thread::sleep(Duration::from_millis(1));
        }

        let same = {
            let handler = Arc::clone(&handler);
            thread::spawn(move || handler.cache_frame(1))
        };
        thread::sleep(Duration::from_millis(20));
        decoder.open_gate();

        assert!(display.join().unwrap());
        assert!(other.join().unwrap());
        assert!(!same.join().unwrap());

        assert_eq!(decoder.calls_for(1), 1);
        assert_eq!(decoder.calls_for(2), 1);
        assert_eq!(handler.current_frame_index(), Some(1));
        assert!(handler.is_cached(2));
        assert_eq!(handler.fetch_stats().duplicate_requests(), 1);
    }
}

#[test]
fn test_caching_twice_decodes_once() {
    let (handler, decoder, _observer) = setup(Duration::ZERO, 1000);

    assert!(handler.cache_frame(7));
    let size = handler.cached_frame_count();
    assert!(!handler.cache_frame(7));

    assert_eq!(handler.cached_frame_count(), size);
    assert_eq!(decoder.calls_for(7), 1);
}

#[test]
fn test_caching_notifications_are_rate_limited() {
    let (handler, _decoder, observer) = setup(Duration::ZERO, 400);

    for index in 0..50 {
        handler.cache_frame(index);
    }
    assert_eq!(handler.cached_frame_count(), 50);
    assert!(observer.changes().is_empty());

    thread::sleep(Duration::from_millis(1000));
    assert_eq!(observer.changes(), vec![(false, false)]);
}

#[test]
fn test_background_worker_and_render_loop() {
    let (handler, decoder, _observer) = setup(Duration::from_millis(2), 1000);
    let frames: FrameIndex = 40;

    let worker = {
        let handler = Arc::clone(&handler);
        thread::spawn(move || {
            for index in 0..frames {
                handler.cache_frame(index);
            }
        })
    };

    for index in 0..frames {
        assert!(handler.display_frame(index));
        assert_eq!(handler.current_frame_index(), Some(index));
    }
    worker.join().unwrap();

    // Frames the render loop decoded itself are staged, not cached
    for index in 0..frames {
        assert_eq!(decoder.calls_for(index), 1, "frame {} decoded twice", index);
    }
    assert!(handler.cached_frame_count() <= frames as usize);
    assert_eq!(handler.stats().in_flight, 0);
}

#[test]
fn test_clear_cache() {
    let (handler, _decoder, observer) = setup(Duration::ZERO, 1000);
    for index in [1, 4, 9] {
        handler.cache_frame(index);
    }

    handler.clear_cache();
    assert_eq!(handler.cached_frame_count(), 0);
    for index in [1, 4, 9] {
        assert!(!handler.is_cached(index));
    }
    assert_eq!(observer.changes(), vec![(false, false)]);
}

#[test]
fn test_geometry_change_invalidates_everything() {
    let (handler, _decoder, observer) = setup(Duration::ZERO, 1000);
    handler.cache_frame(1);
    handler.display_frame(2);

    handler.set_frame_size(WIDTH * 2, HEIGHT * 2);

    assert_eq!(handler.cached_frame_count(), 0);
    assert_eq!(handler.current_frame_index(), None);
    assert!(handler.current_image().is_none());
    assert_eq!(observer.frame_limits.load(Ordering::SeqCst), 1);
    assert_eq!(observer.changes(), vec![(true, true)]);

    let stats = handler.stats();
    assert_eq!(stats.current_frame, None);
    let json = serde_json::to_value(&stats).unwrap();
    assert!(json["current_frame"].is_null());
}

#[test]
fn test_cache_in_flight_during_invalidation_is_discarded() {
    let (handler, _decoder, _observer) = setup(Duration::from_millis(100), 1000);

    let cacher = {
        let handler = Arc::clone(&handler);
        thread::spawn(move || handler.cache_frame(6))
    };
    while !handler.is_caching(6) {
        thread::sleep(Duration::from_millis(1));
    }

    handler.invalidate_all_buffers();
    assert!(!cacher.join().unwrap());
    assert!(!handler.is_cached(6));
}
