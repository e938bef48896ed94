pub mod elevenlabs;
pub mod google_oauth;
pub mod youtube;
