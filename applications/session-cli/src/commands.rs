//! Line commands accepted on stdin

use anyhow::{anyhow, bail, Context};
use soul_session::{
    AudioFocusEvent, AudioId, PlayExtras, QueueSource, RepeatMode, ShuffleMode, TransportCommand,
};
use std::time::Duration;

pub const HELP: &str = "\
commands:
  play | pause | stop | next | prev
  seek <secs>              jump <index>
  playid <id> [ids...]     shuffleall <ids...>
  enqueue <id>             remove <index> | removeid <id>
  swap <from> <to>         replace <ids...>
  repeat none|one|all      shuffle on|off
  repeatone | repeatall    restore
  focus gained|lost|transient|duck
  queue | status | help | quit";

/// One parsed line
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(TransportCommand),
    Focus(AudioFocusEvent),
    ShowQueue,
    ShowStatus,
    Help,
    Quit,
}

/// Parse a line; blank lines yield `None`
pub fn parse(line: &str) -> anyhow::Result<Option<Input>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "play" => TransportCommand::Play,
        "pause" => TransportCommand::Pause,
        "stop" => TransportCommand::Stop,
        "next" => TransportCommand::SkipNext,
        "prev" | "previous" => TransportCommand::SkipPrevious,
        "seek" => {
            let secs: f64 = arg(&args, 0, "seconds")?
                .parse()
                .context("seek expects seconds")?;
            if !secs.is_finite() || secs < 0.0 {
                bail!("seek expects a non-negative number of seconds");
            }
            TransportCommand::SeekTo(Duration::from_secs_f64(secs))
        }
        "jump" => TransportCommand::SkipToQueueIndex(index(&args, 0)?),
        "playid" => {
            let id = AudioId::from(arg(&args, 0, "id")?);
            let rest = ids(&args[1..]);
            let extras = if rest.is_empty() {
                PlayExtras::default()
            } else {
                // `playid b a b c` plays b within [a, b, c]
                let all = if rest.contains(&id) {
                    rest
                } else {
                    std::iter::once(id.clone()).chain(rest).collect()
                };
                PlayExtras {
                    ids: all,
                    source: QueueSource::Unknown,
                    title: None,
                }
            };
            TransportCommand::PlayFromId { id, extras }
        }
        "shuffleall" => TransportCommand::PlayAllShuffled {
            ids: non_empty_ids(&args)?,
            title: None,
            source: QueueSource::Unknown,
        },
        "enqueue" => TransportCommand::EnqueueNext(arg(&args, 0, "id")?.into()),
        "remove" => TransportCommand::RemoveByPosition(index(&args, 0)?),
        "removeid" => TransportCommand::RemoveById(arg(&args, 0, "id")?.into()),
        "swap" => TransportCommand::SwapPositions {
            from: index(&args, 0)?,
            to: index(&args, 1)?,
        },
        "replace" => TransportCommand::ReplaceQueue {
            ids: ids(&args),
            title: None,
        },
        "repeat" => TransportCommand::SetRepeatMode(match arg(&args, 0, "mode")? {
            "none" | "off" => RepeatMode::None,
            "one" => RepeatMode::One,
            "all" => RepeatMode::All,
            other => bail!("unknown repeat mode: {other}"),
        }),
        "shuffle" => TransportCommand::SetShuffleMode(match arg(&args, 0, "on|off")? {
            "on" | "all" => ShuffleMode::All,
            "off" | "none" => ShuffleMode::None,
            other => bail!("unknown shuffle mode: {other}"),
        }),
        "repeatone" => TransportCommand::RepeatCurrentOne,
        "repeatall" => TransportCommand::RepeatCurrentAll,
        "restore" => TransportCommand::RestoreSavedState,
        "focus" => {
            let event = match arg(&args, 0, "event")? {
                "gained" | "gain" => AudioFocusEvent::Gained,
                "lost" | "loss" => AudioFocusEvent::Lost,
                "transient" => AudioFocusEvent::LostTransient,
                "duck" => AudioFocusEvent::LostTransientCanDuck,
                other => bail!("unknown focus event: {other}"),
            };
            return Ok(Some(Input::Focus(event)));
        }
        "queue" | "q" => return Ok(Some(Input::ShowQueue)),
        "status" | "s" => return Ok(Some(Input::ShowStatus)),
        "help" | "?" => return Ok(Some(Input::Help)),
        "quit" | "exit" => return Ok(Some(Input::Quit)),
        other => bail!("unknown command: {other} (try `help`)"),
    };
    Ok(Some(Input::Command(command)))
}

fn arg<'a>(args: &[&'a str], position: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(position)
        .copied()
        .ok_or_else(|| anyhow!("missing argument: {name}"))
}

fn index(args: &[&str], position: usize) -> anyhow::Result<usize> {
    arg(args, position, "index")?
        .parse()
        .context("index must be a non-negative integer")
}

fn ids(args: &[&str]) -> Vec<AudioId> {
    args.iter().map(|id| AudioId::from(*id)).collect()
}

fn non_empty_ids(args: &[&str]) -> anyhow::Result<Vec<AudioId>> {
    if args.is_empty() {
        bail!("expected at least one id");
    }
    Ok(ids(args))
}
