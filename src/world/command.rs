use crate::chat::Message;
use crate::world::color::validate_color;

/// Where a color change came from; user picks override stream colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSource {
    Stream,
    User,
}

/// Behavioral instruction derived from one message
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Jump,
    SetColor { color: String, source: ColorSource },
    Speak(String),
    Emote(Vec<String>),
}

/// Parses a message into the directives to apply to its entity.
///
/// * `!jump` → `Jump`
/// * `!color <value>` → `SetColor` (user) when the value is a valid color;
///   an invalid value yields no color directive at all, not even the
///   stream color
/// * anything else with text → `Speak(text)`
/// * non-empty emotes always add `Emote`
/// * the stream color is applied unless an invalid `!color` was given
pub fn interpret(message: &Message) -> Vec<Directive> {
    let mut tokens = message.text.split_whitespace();
    let command = tokens.next();
    let argument = tokens.next();

    let mut directives = Vec::new();
    let mut apply_stream_color = true;

    match (command, argument) {
        (Some("!jump"), _) => directives.push(Directive::Jump),
        (Some("!color"), Some(value)) => match validate_color(value) {
            Ok(()) => directives.push(Directive::SetColor {
                color: value.to_string(),
                source: ColorSource::User,
            }),
            Err(_) => apply_stream_color = false,
        },
        _ if !message.text.is_empty() => directives.push(Directive::Speak(message.text.clone())),
        _ => {}
    }

    if !message.emotes.is_empty() {
        directives.push(Directive::Emote(message.emotes.clone()));
    }

    if apply_stream_color {
        if let Some(color) = &message.color {
            directives.push(Directive::SetColor {
                color: color.clone(),
                source: ColorSource::Stream,
            });
        }
    }

    directives
}
