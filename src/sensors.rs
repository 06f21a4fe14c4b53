use std::sync::{Arc, RwLock, TryLockError};

use crate::types::{AudioSample, RawSensors, SignalReading};

#[derive(Clone, Copy, Debug, Default)]
struct Slot<T> {
    value: Option<T>,
    available: bool,
    sequence: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Latest {
    audio: Slot<AudioSample>,
    motion: Slot<f32>,
}

/// Shared handle; clone it into producer threads.
#[derive(Clone, Default)]
pub struct SensorCache {
    latest: Arc<RwLock<Latest>>,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_audio(&self, sample: AudioSample) {
        write_with(&self.latest, |latest| publish(&mut latest.audio, sample));
    }

    pub fn publish_motion(&self, motion: f32) {
        write_with(&self.latest, |latest| publish(&mut latest.motion, motion));
    }

    pub fn set_audio_unavailable(&self) {
        write_with(&self.latest, |latest| latest.audio.available = false);
    }

    pub fn reader(&self) -> SensorReader {
        SensorReader {
            cache: self.clone(),
            last: Latest::default(),
            seen_audio: 0,
            seen_motion: 0,
        }
    }
}

/// Frame-loop side of the cache. Tracks which samples it has already consumed.
pub struct SensorReader {
    cache: SensorCache,
    last: Latest,
    seen_audio: u64,
    seen_motion: u64,
}

impl SensorReader {
    pub fn poll(&mut self) -> RawSensors {
        match self.cache.latest.try_read() {
            Ok(guard) => self.last = *guard,
            Err(TryLockError::Poisoned(poisoned)) => self.last = *poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {}
        }

        RawSensors {
            audio: reading(&self.last.audio, &mut self.seen_audio),
            motion: reading(&self.last.motion, &mut self.seen_motion),
        }
    }
}

fn publish<T>(slot: &mut Slot<T>, value: T) {
    slot.value = Some(value);
    slot.available = true;
    slot.sequence = slot.sequence.wrapping_add(1);
}

fn reading<T: Copy>(slot: &Slot<T>, seen: &mut u64) -> SignalReading<T> {
    match slot.value {
        Some(value) if slot.available => {
            if slot.sequence != *seen {
                *seen = slot.sequence;
                SignalReading::Fresh(value)
            } else {
                SignalReading::Stale
            }
        }
        _ => SignalReading::Unavailable,
    }
}

fn write_with<T>(lock: &RwLock<T>, update: impl FnOnce(&mut T)) {
    match lock.write() {
        Ok(mut guard) => update(&mut *guard),
        Err(poisoned) => update(&mut *poisoned.into_inner()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_cache_is_unavailable() {
        let cache = SensorCache::new();
        let mut reader = cache.reader();
        assert_eq!(reader.poll(), RawSensors::default());
    }

    #[test]
    fn samples_are_fresh_once_then_stale() {
        let cache = SensorCache::new();
        let mut reader = cache.reader();
        let sample = AudioSample {
            low: 0.2,
            mid: 0.3,
            high: 0.4,
            rms: 0.1,
        };
        cache.publish_audio(sample);
        cache.publish_motion(0.25);

        let first = reader.poll();
        assert_eq!(first.audio, SignalReading::Fresh(sample));
        assert_eq!(first.motion, SignalReading::Fresh(0.25));

        let second = reader.poll();
        assert_eq!(second.audio, SignalReading::Stale);
        assert_eq!(second.motion, SignalReading::Stale);
    }

    #[test]
    fn producer_threads_publish_into_the_same_slot() {
        let cache = SensorCache::new();
        let producer = cache.clone();
        std::thread::spawn(move || producer.publish_motion(0.5))
            .join()
            .unwrap();
        let mut reader = cache.reader();
        assert_eq!(reader.poll().motion, SignalReading::Fresh(0.5));
    }

    #[test]
    fn losing_the_device_reports_unavailable() {
        let cache = SensorCache::new();
        let mut reader = cache.reader();
        cache.publish_audio(AudioSample::default());
        reader.poll();
        cache.set_audio_unavailable();
        assert_eq!(reader.poll().audio, SignalReading::Unavailable);
    }
}
