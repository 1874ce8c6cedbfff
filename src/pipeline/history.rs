use crate::{image::Image, model::data::KeyPoints};

pub const HISTORY_CAPACITY: usize = 5;

#[derive(Debug, Clone)]
pub struct Entry {
    pub face: Image,
    pub keypoints: KeyPoints,
}

/// The last few stabilized faces in a fixed ring, oldest evicted first.
#[derive(Debug, Default)]
pub struct History {
    slots: [Option<Entry>; HISTORY_CAPACITY],
    head: usize,
    len: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, entry: Entry) {
        self.slots[self.head] = Some(entry);
        self.head = (self.head + 1) % HISTORY_CAPACITY;
        self.len = (self.len + 1).min(HISTORY_CAPACITY);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        (0..self.len).filter_map(move |offset| {
            let index = (self.head + HISTORY_CAPACITY - self.len + offset) % HISTORY_CAPACITY;
            self.slots[index].as_ref()
        })
    }

    /// Temporal average: `current` at `1 - strength`, every same-sized entry
    /// at `strength / (len + 1)`. Entries of any other size contribute
    /// nothing, so heavy size churn dims the result rather than distorting it.
    pub fn stabilize(&self, current: &Image, strength: f32) -> Image {
        if self.is_empty() {
            return current.clone();
        }

        let (width, height) = current.dimensions();
        let weight = strength / (self.len + 1) as f32;
        let mut accumulator: Vec<f32> = current
            .as_raw()
            .iter()
            .map(|&value| value as f32 * (1. - strength))
            .collect();

        for entry in self.entries() {
            if entry.face.dimensions() != (width, height) {
                continue;
            }
            for (accumulated, &value) in accumulator.iter_mut().zip(entry.face.as_raw().iter()) {
                *accumulated += value as f32 * weight;
            }
        }

        Image::from(image::RgbImage::from_fn(width, height, |x, y| {
            let base = ((y * width + x) * 3) as usize;
            image::Rgb(std::array::from_fn(|channel| {
                accumulator[base + channel].round() as u8
            }))
        }))
    }
}
