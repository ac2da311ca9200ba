pub mod backend;
pub mod selector;
pub mod virtual_device;

pub use backend::{
    AudioFormat, AudioFrame, CaptureBackend, DeviceDescriptor, DeviceKind, Facing, LensClass,
    MediaSample, StreamRequest, TrackFormat, VideoFrame,
};
pub use selector::DeviceSelector;
pub use virtual_device::{VirtualBackend, VirtualDevice, VirtualDeviceConfig, MAX_FRAME_RATE};
