pub mod embeds;
pub mod http;
pub mod text;
