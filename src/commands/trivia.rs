//! Trivia cog backed by opentdb.com.
//!
//! One question per invocation, answered through message buttons. A session
//! token keeps the API from repeating questions at us until it expires.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use poise::CreateReply;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serenity::all::{
    ButtonStyle, ComponentInteractionCollector, CreateActionRow, CreateButton,
    CreateInteractionResponse, CreateInteractionResponseMessage,
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::utils::{embeds, text};
use crate::Context;

type Error = crate::error::Error;

const BASE_URL: &str = "https://opentdb.com/";

/// How long players get to answer.
const ANSWER_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TriviaResponse {
    response_code: u8,
    #[serde(default)]
    results: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub difficulty: String,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

#[derive(Debug)]
pub struct TriviaClient {
    api: crate::utils::http::ApiClient,
    token: RwLock<Option<String>>,
}

impl Default for TriviaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TriviaClient {
    pub fn new() -> Self {
        Self {
            api: crate::utils::http::ApiClient::new(BASE_URL),
            token: RwLock::new(None),
        }
    }

    /// The session token, fetched on first use. Trivia still works without
    /// one, so fetch failures only log.
    async fn session_token(&self) -> Option<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Some(token);
        }
        match self
            .api
            .get::<TokenResponse>("api_token.php", &[("command", "request")])
            .await
        {
            Ok(resp) => {
                *self.token.write().await = Some(resp.token.clone());
                Some(resp.token)
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch a trivia session token");
                None
            }
        }
    }

    /// Fetch one question. Response codes 3 and 4 mean the session token
    /// expired or ran dry; drop it and try once more without.
    pub async fn question(&self) -> Result<Option<Question>, Error> {
        for attempt in 0..2 {
            let token = self.session_token().await;
            let mut params = vec![("amount", "1")];
            if let Some(token) = token.as_deref() {
                params.push(("token", token));
            }
            let resp: TriviaResponse = self.api.get("api.php", &params).await?;
            match resp.response_code {
                0 => return Ok(resp.results.into_iter().next()),
                3 | 4 if attempt == 0 => {
                    *self.token.write().await = None;
                }
                _ => return Ok(None),
            }
        }
        Ok(None)
    }
}

/// Decoded answer set: every choice in shuffled order, plus which one is
/// right.
fn build_choices(question: &Question) -> (Vec<String>, String) {
    let correct = text::decode_html(&question.correct_answer);
    let mut choices: Vec<String> = question
        .incorrect_answers
        .iter()
        .map(|answer| text::decode_html(answer))
        .collect();
    choices.push(correct.clone());
    choices.shuffle(&mut rand::thread_rng());
    (choices, correct)
}

const BUTTON_STYLES: &[ButtonStyle] = &[
    ButtonStyle::Success,
    ButtonStyle::Danger,
    ButtonStyle::Primary,
    ButtonStyle::Secondary,
];

/// Discord caps button labels at 80 characters.
fn button_label(choice: &str) -> String {
    if choice.chars().count() <= 80 {
        choice.to_string()
    } else {
        let mut label: String = choice.chars().take(79).collect();
        label.push('\u{2026}');
        label
    }
}

fn answer_buttons(invocation: u64, choices: &[String], disabled: bool) -> Vec<CreateActionRow> {
    let buttons = choices
        .iter()
        .enumerate()
        .map(|(index, choice)| {
            CreateButton::new(format!("trivia-{invocation}-{index}"))
                .label(button_label(choice))
                .style(BUTTON_STYLES[index % BUTTON_STYLES.len()])
                .disabled(disabled)
        })
        .collect();
    vec![CreateActionRow::Buttons(buttons)]
}

fn wrong_guess_list(tries: &HashMap<String, String>) -> String {
    tries
        .iter()
        .map(|(who, guess)| format!("{who}: {guess}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Play some trivia.
#[poise::command(slash_command, prefix_command, channel_cooldown = 3, category = "Trivia")]
pub async fn trivia(ctx: Context<'_>) -> Result<(), Error> {
    let Some(question) = ctx.data().trivia.question().await? else {
        ctx.say("We encountered an unexpected error. Try again later.")
            .await?;
        return Ok(());
    };

    let (choices, correct) = build_choices(&question);
    let prompt = text::decode_html(&question.question);

    let embed = embeds::trivia_embed().title(prompt.clone()).footer(
        serenity::all::CreateEmbedFooter::new(format!(
            "The difficulty is {}",
            question.difficulty
        )),
    );
    let handle = ctx
        .send(
            CreateReply::default()
                .embed(embed.clone())
                .components(answer_buttons(ctx.id(), &choices, false)),
        )
        .await?;
    let message_id = handle.message().await?.id;

    let mut tries: HashMap<String, String> = HashMap::new();
    let mut winner: Option<String> = None;
    let deadline = Instant::now() + ANSWER_WINDOW;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let prefix = format!("trivia-{}-", ctx.id());
        let Some(interaction) = ComponentInteractionCollector::new(ctx)
            .timeout(remaining)
            .message_id(message_id)
            .filter(move |interaction| interaction.data.custom_id.starts_with(&prefix))
            .await
        else {
            break;
        };

        let player = interaction.user.display_name().to_string();
        if tries.contains_key(&player) {
            interaction
                .create_response(
                    ctx.http(),
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("You already tried and failed.")
                            .ephemeral(true),
                    ),
                )
                .await?;
            continue;
        }

        let picked = interaction
            .data
            .custom_id
            .rsplit('-')
            .next()
            .and_then(|index| index.parse::<usize>().ok())
            .and_then(|index| choices.get(index));
        let Some(picked) = picked else {
            continue;
        };

        if *picked == correct {
            let mut win = embeds::success_embed()
                .title(format!("{player} got it right!"))
                .description(format!("The answer was {correct}"));
            if !tries.is_empty() {
                win = win.field("Wrong guesses", wrong_guess_list(&tries), false);
            }
            interaction
                .create_response(
                    ctx.http(),
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().embed(win),
                    ),
                )
                .await?;
            winner = Some(player);
            break;
        }

        tries.insert(player, picked.clone());
        interaction
            .create_response(
                ctx.http(),
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("Wrong answer.")
                        .ephemeral(true),
                ),
            )
            .await?;
    }

    handle
        .edit(
            ctx,
            CreateReply::default()
                .embed(embed)
                .components(answer_buttons(ctx.id(), &choices, true)),
        )
        .await?;

    if winner.is_none() {
        let timeout_embed = embeds::warning_embed()
            .title("No one got it right in time.")
            .description(format!("The answer was {correct}"))
            .field(
                "Wrong guesses",
                if tries.is_empty() {
                    "No guesses".to_string()
                } else {
                    wrong_guess_list(&tries)
                },
                false,
            );
        ctx.send(CreateReply::default().embed(timeout_embed)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            difficulty: "easy".into(),
            question: "What does &quot;HTTP&quot; stand for?".into(),
            correct_answer: "HyperText Transfer Protocol".into(),
            incorrect_answers: vec![
                "High Tension Transfer Protocol".into(),
                "Hyperlink Text Toolkit Protocol".into(),
                "Home Terminal Transport Protocol".into(),
            ],
        }
    }

    #[test]
    fn choices_contain_the_answer_once() {
        let question = sample_question();
        let (choices, correct) = build_choices(&question);
        assert_eq!(choices.len(), 4);
        assert_eq!(
            choices.iter().filter(|choice| **choice == correct).count(),
            1
        );
    }

    #[test]
    fn api_payload_deserializes() {
        let payload = r#"{
            "response_code": 0,
            "results": [{
                "category": "Science: Computers",
                "type": "multiple",
                "difficulty": "easy",
                "question": "What is 2 + 2?",
                "correct_answer": "4",
                "incorrect_answers": ["3", "5", "22"]
            }]
        }"#;
        let parsed: TriviaResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.response_code, 0);
        assert_eq!(parsed.results[0].incorrect_answers.len(), 3);
    }

    #[test]
    fn empty_result_sets_deserialize() {
        let payload = r#"{"response_code": 1, "results": []}"#;
        let parsed: TriviaResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.response_code, 1);
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn long_answers_fit_on_buttons() {
        let long = "a".repeat(120);
        let label = button_label(&long);
        assert_eq!(label.chars().count(), 80);
        assert!(label.ends_with('\u{2026}'));
        assert_eq!(button_label("short"), "short");
    }

    #[test]
    fn wrong_guesses_render_one_per_line() {
        let mut tries = HashMap::new();
        tries.insert("ada".to_string(), "3".to_string());
        let list = wrong_guess_list(&tries);
        assert_eq!(list, "ada: 3");
    }
}
