use serenity::all::{Context, FullEvent};
use tracing::{error, info};

use crate::commands::prefix;
use crate::Data;

/// Handle guild-level Discord events.
pub async fn handle_event(_ctx: &Context, event: &FullEvent, data: &Data) {
    if let FullEvent::GuildDelete { incomplete, .. } = event {
        // `unavailable` means an outage, not a removal; keep settings then.
        if incomplete.unavailable {
            return;
        }
        let guild_id = incomplete.id.get();
        match prefix::forget_guild(data, guild_id).await {
            Ok(()) => info!(guild_id, "Removed from guild, dropped its prefix"),
            Err(why) => error!(guild_id, error = %why, "Failed to drop guild prefix"),
        }
    }
}
