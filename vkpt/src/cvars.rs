use std::mem;

use log::{info, warn};

use crate::{gpu, Error, Result};

/// Host-side store of the console variables uploaded within the global UBO.
#[derive(Clone, Debug, Default)]
pub struct CvarRegistry {
    cvars: gpu::Cvars,
    dirty: bool,
}

impl CvarRegistry {
    pub fn new() -> Self {
        Self {
            cvars: Default::default(),
            dirty: true,
        }
    }

    pub fn desc(name: &str) -> Result<&'static gpu::CvarDesc> {
        gpu::UBO_CVAR_LIST
            .iter()
            .find(|desc| desc.name == name)
            .ok_or_else(|| Error::UnknownCvar(name.into()))
    }

    pub fn get(&self, name: &str) -> Result<f32> {
        self.cvars
            .get(name)
            .ok_or_else(|| Error::UnknownCvar(name.into()))
    }

    /// Sets a cvar; values outside of its range get clamped into it.
    ///
    /// Returns the value actually stored.
    pub fn set(&mut self, name: &str, value: f32) -> Result<f32> {
        let desc = Self::desc(name)?;

        if value.is_nan() {
            return Err(Error::InvalidCvarValue {
                name: name.into(),
                value: value.to_string(),
            });
        }

        let clamped = desc.clamp(value);

        if clamped != value {
            warn!(
                "Cvar `{name}` is out of range; value={value}, range={}..={}, using {clamped}",
                desc.min, desc.max,
            );
        }

        let slot = self
            .cvars
            .get_mut(name)
            .ok_or_else(|| Error::UnknownCvar(name.into()))?;

        if *slot != clamped {
            *slot = clamped;
            self.dirty = true;
        }

        Ok(clamped)
    }

    /// Parses and applies a console-style command, e.g. `flt_taa 2`.
    pub fn set_from_str(&mut self, command: &str) -> Result<f32> {
        let mut parts = command.split_whitespace();

        let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidCvarCommand(command.into()));
        };

        Self::desc(name)?;

        let value = value.parse().map_err(|_| Error::InvalidCvarValue {
            name: name.into(),
            value: value.into(),
        })?;

        self.set(name, value)
    }

    /// Brings given cvar back to its default value.
    pub fn reset(&mut self, name: &str) -> Result<()> {
        let desc = Self::desc(name)?;

        self.set(name, desc.default)?;

        Ok(())
    }

    pub fn reset_all(&mut self) {
        info!("Resetting all cvars");

        self.cvars = Default::default();
        self.dirty = true;
    }

    pub fn cvars(&self) -> &gpu::Cvars {
        &self.cvars
    }

    /// Returns the cvars when they've changed since the last call.
    pub fn take_modified(&mut self) -> Option<&gpu::Cvars> {
        mem::take(&mut self.dirty).then_some(&self.cvars)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static gpu::CvarDesc, f32)> + '_ {
        gpu::UBO_CVAR_LIST
            .iter()
            .filter_map(|desc| Some((desc, self.cvars.get(desc.name)?)))
    }
}
