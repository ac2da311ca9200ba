mod player;
mod trigger;

pub use player::{FfplayFactory, FfplayPlayer, MediaPlayer, OverlayFrame, PlayerFactory};
pub use trigger::{GesturePhase, HostView, PlaybackSession, PlaybackTrigger};
