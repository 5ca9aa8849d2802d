//! Weather cog backed by weatherapi.com.
//!
//! Guilds pick their units (C/F, kph/mph) with `units`; the choice is
//! persisted and honored by `current` and `forecast`.

use poise::CreateReply;
use serde::Deserialize;
use serenity::all::CreateEmbed;
use sqlx::SqlitePool;

use crate::utils::embeds;
use crate::utils::http::ApiClient;
use crate::Context;

type Error = crate::error::Error;

const BASE_URL: &str = "http://api.weatherapi.com/v1/";

/// Typed client for the handful of weatherapi.com routes the cog uses.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    api: ApiClient,
    key: String,
}

/// weatherapi.com reports failures inside a 200 body; every response is
/// either the payload or this envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiResult<T> {
    Err { error: ApiError },
    Ok(T),
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub name: String,
    pub region: String,
    pub country: String,
    pub tz_id: String,
    pub localtime: String,
}

#[derive(Debug, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct Current {
    pub temp_c: f64,
    pub temp_f: f64,
    pub feelslike_c: f64,
    pub feelslike_f: f64,
    pub wind_kph: f64,
    pub wind_mph: f64,
    pub wind_dir: String,
    pub vis_km: f64,
    pub vis_miles: f64,
    pub last_updated_epoch: i64,
    pub condition: Condition,
}

#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    pub location: Location,
    pub current: Current,
}

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub location: Location,
    pub forecast: Forecast,
}

#[derive(Debug, Deserialize)]
pub struct Forecast {
    pub forecastday: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastDay {
    pub date_epoch: i64,
    pub day: Day,
    pub astro: Astro,
}

#[derive(Debug, Deserialize)]
pub struct Day {
    pub maxtemp_c: f64,
    pub maxtemp_f: f64,
    pub mintemp_c: f64,
    pub mintemp_f: f64,
    pub maxwind_kph: f64,
    pub maxwind_mph: f64,
    pub totalprecip_mm: f64,
    pub totalprecip_in: f64,
    pub avgvis_km: f64,
    pub avgvis_miles: f64,
    pub daily_chance_of_rain: i64,
    pub daily_chance_of_snow: i64,
    pub condition: Condition,
}

#[derive(Debug, Deserialize)]
pub struct Astro {
    pub sunrise: String,
    pub sunset: String,
    pub moon_phase: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct TimezoneResponse {
    pub location: Location,
}

impl WeatherClient {
    pub fn new(key: String) -> Self {
        Self {
            api: ApiClient::new(BASE_URL),
            key,
        }
    }

    pub async fn current(&self, location: &str) -> Result<ApiResult<CurrentResponse>, Error> {
        Ok(self
            .api
            .get(
                "current.json",
                &[("key", self.key.as_str()), ("q", location), ("aqi", "no")],
            )
            .await?)
    }

    pub async fn forecast(
        &self,
        location: &str,
        days: u8,
    ) -> Result<ApiResult<ForecastResponse>, Error> {
        let days = days.to_string();
        Ok(self
            .api
            .get(
                "forecast.json",
                &[
                    ("key", self.key.as_str()),
                    ("q", location),
                    ("days", days.as_str()),
                ],
            )
            .await?)
    }

    pub async fn search(&self, query: &str) -> Result<ApiResult<Vec<SearchHit>>, Error> {
        Ok(self
            .api
            .get("search.json", &[("key", self.key.as_str()), ("q", query)])
            .await?)
    }

    pub async fn timezone(&self, location: &str) -> Result<ApiResult<TimezoneResponse>, Error> {
        Ok(self
            .api
            .get("timezone.json", &[("key", self.key.as_str()), ("q", location)])
            .await?)
    }
}

// ─── Guild unit settings ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum TempUnit {
    C,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum SpeedUnit {
    Kph,
    Mph,
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum UnitPreset {
    Metric,
    Customary,
}

impl TempUnit {
    fn label(self) -> &'static str {
        match self {
            TempUnit::C => "C",
            TempUnit::F => "F",
        }
    }

    fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("f") {
            TempUnit::F
        } else {
            TempUnit::C
        }
    }
}

impl SpeedUnit {
    fn label(self) -> &'static str {
        match self {
            SpeedUnit::Kph => "kph",
            SpeedUnit::Mph => "mph",
        }
    }

    fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("mph") {
            SpeedUnit::Mph
        } else {
            SpeedUnit::Kph
        }
    }
}

/// A guild's unit settings; metric when it never picked any.
async fn guild_units(db: &SqlitePool, guild_id: Option<u64>) -> (TempUnit, SpeedUnit) {
    let Some(guild_id) = guild_id else {
        return (TempUnit::C, SpeedUnit::Kph);
    };
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT temp, speed FROM weather_units WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(db)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(guild_id, error = %err, "failed to read weather units");
                None
            });
    match row {
        Some((temp, speed)) => (
            TempUnit::from_label(&temp),
            SpeedUnit::from_label(&speed),
        ),
        None => (TempUnit::C, SpeedUnit::Kph),
    }
}

// ─── Commands ────────────────────────────────────────────────────────

/// Fetch the cog's client, or tell the user the cog is switched off.
async fn client<'a>(ctx: &'a Context<'_>) -> Result<Option<&'a WeatherClient>, Error> {
    match ctx.data().weather.as_ref() {
        Some(client) => Ok(Some(client)),
        None => {
            ctx.say("Weather commands are not configured on this bot.")
                .await?;
            Ok(None)
        }
    }
}

/// Get the current weather of a location.
#[poise::command(slash_command, prefix_command, category = "Weather")]
pub async fn current(
    ctx: Context<'_>,
    #[description = "The location"]
    #[rest]
    location: String,
) -> Result<(), Error> {
    let Some(client) = client(&ctx).await? else {
        return Ok(());
    };
    match client.current(&location).await? {
        ApiResult::Err { error } => send_api_error(&ctx, error).await,
        ApiResult::Ok(data) => {
            let units = guild_units(&ctx.data().db, ctx.guild_id().map(|g| g.get())).await;
            let embed = build_current_embed(&data, units);
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
    }
}

/// Get the forecast for a location.
#[poise::command(slash_command, prefix_command, category = "Weather")]
pub async fn forecast(
    ctx: Context<'_>,
    #[description = "Days into the future (1-10)"] days: Option<u8>,
    #[description = "The location"]
    #[rest]
    location: String,
) -> Result<(), Error> {
    let Some(client) = client(&ctx).await? else {
        return Ok(());
    };
    let days = days.unwrap_or(1).clamp(1, 10);
    match client.forecast(&location, days).await? {
        ApiResult::Err { error } => send_api_error(&ctx, error).await,
        ApiResult::Ok(data) => {
            let Some(day) = data.forecast.forecastday.get(days as usize - 1) else {
                ctx.say(format!(
                    "I couldn't find anything for {days} days away. Try another number."
                ))
                .await?;
                return Ok(());
            };
            let units = guild_units(&ctx.data().db, ctx.guild_id().map(|g| g.get())).await;
            let embed = build_forecast_embed(&data.location, day, units);
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
    }
}

/// Search up a city.
#[poise::command(
    slash_command,
    prefix_command,
    aliases("place", "town"),
    category = "Weather"
)]
pub async fn city(
    ctx: Context<'_>,
    #[description = "Which result to show"] index: Option<u32>,
    #[description = "The query"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    let Some(client) = client(&ctx).await? else {
        return Ok(());
    };
    match client.search(&query).await? {
        ApiResult::Err { error } => send_api_error(&ctx, error).await,
        ApiResult::Ok(hits) => {
            let index = index.unwrap_or(1).max(1) as usize;
            let Some(hit) = hits.get(index - 1) else {
                ctx.say("I couldn't find that result. Make sure that city exists.")
                    .await?;
                return Ok(());
            };
            let embed = embeds::weather_embed()
                .title(hit.name.clone())
                .field("Region", &hit.region, false)
                .field("Country", &hit.country, true)
                .field("Latitude", hit.lat.to_string(), false)
                .field("Longitude", hit.lon.to_string(), true);
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
    }
}

/// Get the timezone of a location.
#[poise::command(slash_command, prefix_command, aliases("tz"), category = "Weather")]
pub async fn timezone(
    ctx: Context<'_>,
    #[description = "The location"]
    #[rest]
    location: String,
) -> Result<(), Error> {
    let Some(client) = client(&ctx).await? else {
        return Ok(());
    };
    match client.timezone(&location).await? {
        ApiResult::Err { error } => send_api_error(&ctx, error).await,
        ApiResult::Ok(data) => {
            let location = data.location;
            let embed = embeds::weather_embed()
                .title(format!(
                    "{}, {}, {}",
                    location.name, location.region, location.country
                ))
                .field("Timezone ID", &location.tz_id, true)
                .field("Local Time", &location.localtime, true);
            ctx.send(CreateReply::default().embed(embed)).await?;
            Ok(())
        }
    }
}

/// Change the weather units for this server.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    category = "Weather"
)]
pub async fn units(
    ctx: Context<'_>,
    #[description = "metric or customary shortcut"] preset: Option<UnitPreset>,
    #[description = "The temperature unit"] temp: Option<TempUnit>,
    #[description = "The speed unit"] speed: Option<SpeedUnit>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id().map(|g| g.get()) else {
        return Ok(());
    };

    let (new_temp, new_speed) = match (preset, temp, speed) {
        (Some(UnitPreset::Metric), _, _) => (TempUnit::C, SpeedUnit::Kph),
        (Some(UnitPreset::Customary), _, _) => (TempUnit::F, SpeedUnit::Mph),
        (None, None, None) => {
            ctx.say("You must give at least one argument. **Args:**\n`temp` `C` or `F`\n`speed` `kph` or `mph`")
                .await?;
            return Ok(());
        }
        (None, temp, speed) => {
            let (current_temp, current_speed) =
                guild_units(&ctx.data().db, Some(guild_id)).await;
            (
                temp.unwrap_or(current_temp),
                speed.unwrap_or(current_speed),
            )
        }
    };

    sqlx::query(
        "INSERT INTO weather_units (guild_id, temp, speed) VALUES (?, ?, ?)
         ON CONFLICT(guild_id) DO UPDATE SET temp = excluded.temp, speed = excluded.speed",
    )
    .bind(guild_id as i64)
    .bind(new_temp.label())
    .bind(new_speed.label())
    .execute(&ctx.data().db)
    .await?;

    ctx.say(format!(
        "New settings! Temp: `{}` Speed: `{}`",
        new_temp.label(),
        new_speed.label()
    ))
    .await?;
    Ok(())
}

// ─── Embed builders ──────────────────────────────────────────────────

async fn send_api_error(ctx: &Context<'_>, error: ApiError) -> Result<(), Error> {
    tracing::debug!(code = error.code, "weather API error");
    let embed = embeds::error_embed()
        .title("Error")
        .description(error.message);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

fn temp_fields(current: &Current, unit: TempUnit) -> (f64, f64) {
    match unit {
        TempUnit::C => (current.temp_c, current.feelslike_c),
        TempUnit::F => (current.temp_f, current.feelslike_f),
    }
}

fn wind_fields(current: &Current, unit: SpeedUnit) -> (f64, String) {
    match unit {
        SpeedUnit::Kph => (current.wind_kph, format!("{} km", current.vis_km)),
        SpeedUnit::Mph => (current.wind_mph, format!("{} miles", current.vis_miles)),
    }
}

fn build_current_embed(data: &CurrentResponse, units: (TempUnit, SpeedUnit)) -> CreateEmbed {
    let (temp_unit, speed_unit) = units;
    let (temp, feels_like) = temp_fields(&data.current, temp_unit);
    let (speed, visibility) = wind_fields(&data.current, speed_unit);

    embeds::weather_embed()
        .title(format!(
            "{}, {}, {}",
            data.location.name, data.location.region, data.location.country
        ))
        .field("Temperature", format!("{temp} {}", temp_unit.label()), true)
        .field(
            "Feels Like",
            format!("{feels_like} {}", temp_unit.label()),
            true,
        )
        .field("Weather", &data.current.condition.text, true)
        .field("Wind Direction", &data.current.wind_dir, true)
        .field(
            "Wind Speed",
            format!("{speed} {}", speed_unit.label()),
            true,
        )
        .field("Visibility", visibility, true)
        .field(
            "Last Updated At",
            format!("<t:{}:R>", data.current.last_updated_epoch),
            true,
        )
        .thumbnail(format!("https:{}", data.current.condition.icon))
        .footer(serenity::all::CreateEmbedFooter::new(format!(
            "Local Time: {}",
            data.location.localtime
        )))
}

fn build_forecast_embed(
    location: &Location,
    day: &ForecastDay,
    units: (TempUnit, SpeedUnit),
) -> CreateEmbed {
    let (temp_unit, speed_unit) = units;
    let (high, low) = match temp_unit {
        TempUnit::C => (day.day.maxtemp_c, day.day.mintemp_c),
        TempUnit::F => (day.day.maxtemp_f, day.day.mintemp_f),
    };
    let (wind, precip, vis) = match speed_unit {
        SpeedUnit::Kph => (
            format!("{} kph", day.day.maxwind_kph),
            format!("{} mm", day.day.totalprecip_mm),
            format!("{} km", day.day.avgvis_km),
        ),
        SpeedUnit::Mph => (
            format!("{} mph", day.day.maxwind_mph),
            format!("{} in", day.day.totalprecip_in),
            format!("{} miles", day.day.avgvis_miles),
        ),
    };

    embeds::weather_embed()
        .title(format!(
            "{}, {}, {}",
            location.name, location.region, location.country
        ))
        .field("Forecast Date", format!("<t:{}:D>", day.date_epoch), true)
        .field("Weather", &day.day.condition.text, true)
        .field("High", format!("{high} {}", temp_unit.label()), true)
        .field("Low", format!("{low} {}", temp_unit.label()), true)
        .field("Wind", wind, true)
        .field("Visibility", vis, true)
        .field("Rain", precip, true)
        .field(
            "Chance of Rain",
            format!("{}%", day.day.daily_chance_of_rain),
            true,
        )
        .field(
            "Chance of Snow",
            format!("{}%", day.day.daily_chance_of_snow),
            true,
        )
        .field("Sunrise", &day.astro.sunrise, true)
        .field("Sunset", &day.astro.sunset, true)
        .field("Moon Phase", &day.astro.moon_phase, true)
        .thumbnail(format!("https:{}", day.day.condition.icon))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_current() -> Current {
        Current {
            temp_c: 20.0,
            temp_f: 68.0,
            feelslike_c: 19.0,
            feelslike_f: 66.2,
            wind_kph: 10.0,
            wind_mph: 6.2,
            wind_dir: "NW".into(),
            vis_km: 10.0,
            vis_miles: 6.0,
            last_updated_epoch: 1_640_000_000,
            condition: Condition {
                text: "Sunny".into(),
                icon: "//cdn.weatherapi.com/icon.png".into(),
            },
        }
    }

    #[test]
    fn unit_labels_round_trip() {
        assert_eq!(TempUnit::from_label("f"), TempUnit::F);
        assert_eq!(TempUnit::from_label("C"), TempUnit::C);
        assert_eq!(SpeedUnit::from_label("MPH"), SpeedUnit::Mph);
        assert_eq!(SpeedUnit::from_label("kph"), SpeedUnit::Kph);
        assert_eq!(TempUnit::F.label(), "F");
        assert_eq!(SpeedUnit::Mph.label(), "mph");
    }

    #[test]
    fn metric_units_pick_metric_fields() {
        let current = sample_current();
        assert_eq!(temp_fields(&current, TempUnit::C), (20.0, 19.0));
        let (speed, vis) = wind_fields(&current, SpeedUnit::Kph);
        assert_eq!(speed, 10.0);
        assert_eq!(vis, "10 km");
    }

    #[test]
    fn customary_units_pick_customary_fields() {
        let current = sample_current();
        assert_eq!(temp_fields(&current, TempUnit::F), (68.0, 66.2));
        let (speed, vis) = wind_fields(&current, SpeedUnit::Mph);
        assert_eq!(speed, 6.2);
        assert_eq!(vis, "6 miles");
    }

    #[test]
    fn api_error_envelope_deserializes() {
        let payload = r#"{"error":{"code":1006,"message":"No matching location found."}}"#;
        let parsed: ApiResult<CurrentResponse> = serde_json::from_str(payload).unwrap();
        match parsed {
            ApiResult::Err { error } => {
                assert_eq!(error.code, 1006);
                assert_eq!(error.message, "No matching location found.");
            }
            ApiResult::Ok(_) => panic!("expected the error envelope"),
        }
    }
}
