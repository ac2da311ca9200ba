use tracing::{debug, info, warn};

use super::backend::{CaptureBackend, DeviceDescriptor, DeviceKind, Facing, LensClass};
use crate::error::{CaptureError, CaptureResult};

/// Picks the best available device for a requested capability
///
/// Device lists are queried from the backend on every call.
pub struct DeviceSelector<'a> {
    backend: &'a dyn CaptureBackend,
}

impl<'a> DeviceSelector<'a> {
    pub fn new(backend: &'a dyn CaptureBackend) -> Self {
        Self { backend }
    }

    /// Resolve a device of `kind`
    ///
    /// Cameras are looked up on the back of the device in `preferred_lenses`
    /// order. The lens list is ignored for microphones.
    pub fn resolve(
        &self,
        kind: DeviceKind,
        preferred_lenses: &[LensClass],
    ) -> CaptureResult<DeviceDescriptor> {
        match kind {
            DeviceKind::Camera => self.resolve_camera(Facing::Back, preferred_lenses),
            DeviceKind::Microphone => self.resolve_microphone(),
        }
    }

    /// First camera facing `facing` whose lens class appears in
    /// `preferred_lenses`, in list order
    pub fn resolve_camera(
        &self,
        facing: Facing,
        preferred_lenses: &[LensClass],
    ) -> CaptureResult<DeviceDescriptor> {
        let devices = self.backend.devices();

        for lens in preferred_lenses {
            let found = devices.iter().find(|d| {
                d.kind == DeviceKind::Camera && d.facing == Some(facing) && d.lens == Some(*lens)
            });

            match found {
                Some(device) => {
                    info!("Resolved {:?} {:?} camera: {}", facing, lens, device.name);
                    return Ok(device.clone());
                }
                None => debug!("No {:?} {:?} camera on {}", facing, lens, self.backend.name()),
            }
        }

        warn!(
            "No {:?} camera matching {:?} on {}",
            facing,
            preferred_lenses,
            self.backend.name()
        );
        Err(CaptureError::DeviceUnavailable(DeviceKind::Camera))
    }

    /// The system default microphone, or the first one listed
    pub fn resolve_microphone(&self) -> CaptureResult<DeviceDescriptor> {
        let microphones: Vec<DeviceDescriptor> = self
            .backend
            .devices()
            .into_iter()
            .filter(|d| d.kind == DeviceKind::Microphone)
            .collect();

        let device = microphones
            .iter()
            .find(|d| d.is_default)
            .or_else(|| microphones.first())
            .cloned();

        match device {
            Some(device) => {
                info!("Resolved microphone: {}", device.name);
                Ok(device)
            }
            None => {
                warn!("No microphone on {}", self.backend.name());
                Err(CaptureError::DeviceUnavailable(DeviceKind::Microphone))
            }
        }
    }
}
