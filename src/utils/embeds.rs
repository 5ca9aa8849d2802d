use serenity::all::CreateEmbed;

/// Colors used across all bot embeds, one per cog family.
pub struct Colors;

impl Colors {
    pub const DEFAULT: u32 = 0x5865F2;
    pub const SUCCESS: u32 = 0x00FF7F;
    pub const WARNING: u32 = 0xFFD700;
    pub const ERROR: u32 = 0xFF4444;
    pub const WEATHER: u32 = 0x87CEEB;
    pub const TRIVIA: u32 = 0x9146FF;
    pub const JOKES: u32 = 0xFFA500;
    pub const CODE: u32 = 0x2B2D31;
}

/// Create a standard embed with default color, footer, and timestamp.
pub fn default_embed() -> CreateEmbed {
    base_embed(Colors::DEFAULT)
}

/// Create a success-themed embed (green).
pub fn success_embed() -> CreateEmbed {
    base_embed(Colors::SUCCESS)
}

/// Create a warning-themed embed (gold).
pub fn warning_embed() -> CreateEmbed {
    base_embed(Colors::WARNING)
}

/// Create an error-themed embed (red).
pub fn error_embed() -> CreateEmbed {
    base_embed(Colors::ERROR)
}

/// Create a weather-themed embed (sky blue).
pub fn weather_embed() -> CreateEmbed {
    base_embed(Colors::WEATHER)
}

/// Create a trivia-themed embed (purple).
pub fn trivia_embed() -> CreateEmbed {
    base_embed(Colors::TRIVIA)
}

/// Create a jokes-themed embed (orange).
pub fn jokes_embed() -> CreateEmbed {
    base_embed(Colors::JOKES)
}

/// Create a code-themed embed (dark).
pub fn code_embed() -> CreateEmbed {
    base_embed(Colors::CODE)
}

fn base_embed(color: u32) -> CreateEmbed {
    CreateEmbed::default()
        .color(color)
        .footer(serenity::all::CreateEmbedFooter::new("MasterBot"))
        .timestamp(serenity::model::Timestamp::now())
}
