//! Player effect chain.
//!
//! Effects are flattened into [`SharedEffect`] (name + string properties) so the
//! engine sees one model regardless of effect type. Identity is the effect id.

use audio_stream_types::{EffectName, EffectProperty, PropertyName, SharedEffect};

/// An effect that can be attached to a player.
pub trait Effect {
    fn id(&self) -> &str;
    fn name(&self) -> EffectName;
    fn properties(&self) -> Vec<EffectProperty>;

    fn to_shared(&self) -> SharedEffect {
        SharedEffect {
            id: self.id().to_string(),
            name: self.name(),
            properties: self.properties(),
        }
    }
}

fn property(name: PropertyName, value: impl ToString) -> EffectProperty {
    EffectProperty {
        name,
        value: value.to_string(),
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Gain stage; `1.0` leaves the signal unchanged.
#[derive(Clone, Debug)]
pub struct VolumeEffect {
    id: String,
    gain: f64,
}

impl VolumeEffect {
    pub fn new(gain: f64) -> Self {
        Self { id: new_id(), gain }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f64) {
        self.gain = gain;
    }
}

impl Default for VolumeEffect {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Effect for VolumeEffect {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> EffectName {
        EffectName::Volume
    }

    fn properties(&self) -> Vec<EffectProperty> {
        vec![property(PropertyName::Gain, self.gain)]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    Highpass,
    Lowpass,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::Highpass => "highpass",
            FilterType::Lowpass => "lowpass",
        }
    }
}

/// Single-pole high- or low-pass filter at a cutoff frequency in Hz.
#[derive(Clone, Debug)]
pub struct FilterEffect {
    id: String,
    filter_type: FilterType,
    frequency: f64,
}

impl FilterEffect {
    pub fn new(filter_type: FilterType, frequency: f64) -> Self {
        Self {
            id: new_id(),
            filter_type,
            frequency,
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }
}

impl Effect for FilterEffect {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> EffectName {
        EffectName::Filter
    }

    fn properties(&self) -> Vec<EffectProperty> {
        vec![
            property(PropertyName::Type, self.filter_type.as_str()),
            property(PropertyName::Frequency, self.frequency),
        ]
    }
}

/// Ordered list of effects keyed by id.
///
/// Every mutator returns whether the list changed, so the caller knows when a
/// full replacement must be pushed to the engine.
#[derive(Clone, Debug, Default)]
pub struct EffectChain {
    effects: Vec<SharedEffect>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `effect`. An id already present has its properties replaced in place.
    pub fn add(&mut self, effect: &dyn Effect) -> bool {
        let shared = effect.to_shared();
        match self.effects.iter_mut().find(|e| e.id == shared.id) {
            Some(existing) => replace_properties(existing, shared.properties),
            None => {
                self.effects.push(shared);
                true
            }
        }
    }

    /// Drop the effect with `id`. Absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.effects.len();
        self.effects = std::mem::take(&mut self.effects)
            .into_iter()
            .filter(|e| e.id != id)
            .collect();
        self.effects.len() != before
    }

    /// Replace the properties of the matching effect. Absent ids are a no-op.
    pub fn update(&mut self, effect: &dyn Effect) -> bool {
        let id = effect.id();
        match self.effects.iter_mut().find(|e| e.id == id) {
            Some(existing) => replace_properties(existing, effect.properties()),
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.effects.iter().any(|e| e.id == id)
    }

    pub fn effects(&self) -> &[SharedEffect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

fn replace_properties(existing: &mut SharedEffect, properties: Vec<EffectProperty>) -> bool {
    if existing.properties == properties {
        return false;
    }
    existing.properties = properties;
    true
}
