//! Color effect plugin implementations.

pub mod ping_pong;
pub mod snake;
pub mod static_color;

pub use ping_pong::{PingPongEffect, PingPongEffectConfig};
pub use snake::{SnakeEffect, SnakeEffectConfig};
pub use static_color::{StaticColorEffect, StaticColorEffectConfig};
