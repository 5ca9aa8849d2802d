//! The code cog: `eval` plus a handful of small code-adjacent commands.
//!
//! `eval` is the only command with real machinery behind it — everything it
//! does after parsing the code block lives in [`crate::sandbox`].

use poise::CreateReply;
use serenity::all::CreateAllowedMentions;

use crate::sandbox::{self, Rejection, SandboxError};
use crate::utils::{embeds, text};
use crate::Context;

type Error = crate::error::Error;

const MISSING_BLOCK: &str =
    "Missing code block. Please use the following markdown\n\\`\\`\\`js\ncode here\n\\`\\`\\`";

/// Longest output we will echo back before truncating; replies must stay
/// under Discord's 2000-character message cap with fencing included.
const MAX_REPLY_OUTPUT: usize = 1900;

/// A fenced code block pulled out of a message.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CodeBlock {
    pub source: String,
}

impl CodeBlock {
    /// Accepts ```` ```js\n...\n``` ```` (language tag optional) and
    /// returns the inner source. `None` when the fences are missing.
    pub(crate) fn parse(argument: &str) -> Option<Self> {
        let trimmed = argument.trim();
        let rest = trimmed.strip_prefix("```")?.strip_suffix("```")?;
        let source = match rest.split_once('\n') {
            Some((tag, body)) if tag.chars().all(|c| c.is_ascii_alphanumeric()) => body,
            _ => rest,
        };
        let source = source.trim_matches('\n');
        if source.is_empty() {
            return None;
        }
        Some(Self {
            source: source.to_string(),
        })
    }
}

/// Evaluate some JavaScript code.
#[poise::command(slash_command, prefix_command, user_cooldown = 60, category = "Code")]
pub async fn eval(
    ctx: Context<'_>,
    #[description = "Code to run (fenced block for the prefix form)"]
    #[rest]
    code: String,
) -> Result<(), Error> {
    // Prefix invocations must fence their code like the help text says;
    // slash invocations hand us the raw source.
    let source = match CodeBlock::parse(&code) {
        Some(block) => block.source,
        None if matches!(ctx, poise::Context::Prefix(_)) => {
            ctx.say(MISSING_BLOCK).await?;
            return Ok(());
        }
        None => code,
    };

    ctx.defer().await?;

    match sandbox::run(&ctx.data().sandbox, &source).await {
        Ok(result) => {
            tracing::debug!(
                elapsed_ms = result.elapsed.as_millis() as u64,
                "eval completed"
            );
            let mut output = result.output;
            if output.len() > MAX_REPLY_OUTPUT {
                let mut cut = MAX_REPLY_OUTPUT;
                while !output.is_char_boundary(cut) {
                    cut -= 1;
                }
                output.truncate(cut);
                output.push('\u{2026}');
            }
            ctx.reply(format!("```\n{output}\n```")).await?;
        }
        Err(SandboxError::Rejected(rejection)) => {
            ctx.say(rejection_reply(&rejection)).await?;
        }
        Err(SandboxError::Timed(_)) => {
            ctx.reply("Your code took too long to run.").await?;
        }
        Err(SandboxError::Failed { kind, message }) => {
            ctx.reply(format!(
                "Your code raised an exception\n```\n{kind}: {message}\n```"
            ))
            .await?;
        }
        Err(err) => {
            tracing::error!(error = %err, "sandbox invocation failed");
            ctx.say("The sandbox could not be started. Try again later.")
                .await?;
        }
    }

    Ok(())
}

fn rejection_reply(rejection: &Rejection) -> String {
    match rejection {
        Rejection::TooLong { limit, .. } => format!("You can't eval over {limit} lines."),
        Rejection::ForbiddenWord(_) => {
            "Your code has a word that would be risky to eval.".to_string()
        }
        Rejection::ForbiddenImport(_) => {
            "Your code has an import that would be risky to eval.".to_string()
        }
    }
}

/// Check when a user was created at.
#[poise::command(slash_command, prefix_command, category = "Code")]
pub async fn created(
    ctx: Context<'_>,
    #[description = "The user"] user: Option<serenity::all::User>,
    #[description = "A raw user ID"] id: Option<u64>,
) -> Result<(), Error> {
    let snowflake = match (user, id) {
        (Some(user), _) => user.id.get(),
        (None, Some(id)) if id > 0 => id,
        _ => {
            ctx.say("Give me a user or a id").await?;
            return Ok(());
        }
    };

    let created_at = serenity::all::UserId::new(snowflake).created_at();
    let reply = CreateReply::default()
        .content(format!("<t:{}:R>", created_at.unix_timestamp()))
        .allowed_mentions(CreateAllowedMentions::new().empty_users());
    ctx.send(reply).await?;
    Ok(())
}

/// Get the binary of a number.
#[poise::command(slash_command, prefix_command, category = "Code")]
pub async fn binaryint(
    ctx: Context<'_>,
    #[description = "The number"] integer: i64,
) -> Result<(), Error> {
    ctx.say(format!("{integer:b}")).await?;
    Ok(())
}

/// Get the hex of a number.
#[poise::command(
    slash_command,
    prefix_command,
    aliases("hexadecimal"),
    category = "Code"
)]
pub async fn hexint(
    ctx: Context<'_>,
    #[description = "The number"] integer: i64,
) -> Result<(), Error> {
    ctx.say(format!("{integer:#x}")).await?;
    Ok(())
}

/// Get the octal of a number.
#[poise::command(slash_command, prefix_command, aliases("octal"), category = "Code")]
pub async fn octint(
    ctx: Context<'_>,
    #[description = "The number"] integer: i64,
) -> Result<(), Error> {
    ctx.say(format!("{integer:#o}")).await?;
    Ok(())
}

/// Paths the `source` command refuses to serve.
const HIDDEN_PATHS: &[&str] = &[".env", "databases/", "target/", ".."];

/// Get some code of the bot.
#[poise::command(slash_command, prefix_command, category = "Code")]
pub async fn source(
    ctx: Context<'_>,
    #[description = "File path inside the bot's tree"] file_path: String,
    #[description = "A line or start-end range"] lines: Option<String>,
) -> Result<(), Error> {
    if file_path.starts_with('/')
        || file_path.starts_with('~')
        || HIDDEN_PATHS.iter().any(|hidden| file_path.contains(hidden))
    {
        return Ok(());
    }

    let content = match tokio::fs::read_to_string(&file_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            ctx.say("I couldn't find that file.").await?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let all: Vec<&str> = content.lines().collect();
    let shown = match lines.as_deref().map(parse_line_range) {
        None => all.join("\n"),
        Some(Some((start, end))) => {
            let start = start.min(all.len());
            let end = end.min(all.len());
            all[start..end].join("\n")
        }
        Some(None) => {
            ctx.say("I couldn't make sense of that line range.").await?;
            return Ok(());
        }
    };

    let shown = text::escape_backticks(&shown);
    if shown.len() > 4000 {
        ctx.say("Too much to send.").await?;
        return Ok(());
    }

    let embed = embeds::code_embed()
        .title(format!("Code for {file_path}"))
        .description(format!("```rust\n{shown}\n```"));
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// "12" → line 12 only; "10-20" → that span. 1-based on the wire,
/// half-open 0-based out.
fn parse_line_range(range: &str) -> Option<(usize, usize)> {
    if let Some((start, end)) = range.split_once('-') {
        let start: usize = start.trim().parse().ok()?;
        let end: usize = end.trim().parse().ok()?;
        if start == 0 || end < start {
            return None;
        }
        Some((start - 1, end))
    } else {
        let line: usize = range.trim().parse().ok()?;
        if line == 0 {
            return None;
        }
        Some((line - 1, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_with_language_tag() {
        let block = CodeBlock::parse("```js\nprint(1);\n```").unwrap();
        assert_eq!(block.source, "print(1);");
    }

    #[test]
    fn fenced_block_without_language_tag() {
        let block = CodeBlock::parse("```\nprint(1);\nprint(2);\n```").unwrap();
        assert_eq!(block.source, "print(1);\nprint(2);");
    }

    #[test]
    fn single_line_fence() {
        let block = CodeBlock::parse("```print(1);```").unwrap();
        assert_eq!(block.source, "print(1);");
    }

    #[test]
    fn unfenced_text_is_not_a_block() {
        assert!(CodeBlock::parse("print(1);").is_none());
        assert!(CodeBlock::parse("``broken``").is_none());
        assert!(CodeBlock::parse("``````").is_none());
    }

    #[test]
    fn line_ranges_parse() {
        assert_eq!(parse_line_range("12"), Some((11, 12)));
        assert_eq!(parse_line_range("10-20"), Some((9, 20)));
        assert_eq!(parse_line_range("0"), None);
        assert_eq!(parse_line_range("20-10"), None);
        assert_eq!(parse_line_range("abc"), None);
    }
}
