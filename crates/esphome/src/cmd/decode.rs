use std::io::Read;

use esphome_frame::{decode_multiple, TaggedMessage, UnknownTypePolicy};
use esphome_proto::{Message, MessageRegistry};
use serde::Serialize;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct MessageOutput {
    type_id: u32,
    name: &'static str,
    message: String,
}

impl From<&TaggedMessage<Message>> for MessageOutput {
    fn from(tagged: &TaggedMessage<Message>) -> Self {
        Self {
            type_id: tagged.type_id(),
            name: tagged.message().kind().name(),
            message: format!("{:?}", tagged.message()),
        }
    }
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = match args.hex {
        Some(hex) => hex,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|err| io_error("reading stdin failed", err))?;
            buf
        }
    };

    let messages = decode_hex(&input, args.strict)?;
    let out: Vec<MessageOutput> = messages.iter().map(MessageOutput::from).collect();
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = table(vec!["TYPE", "NAME", "MESSAGE"]);
            for message in &out {
                table.add_row(vec![
                    message.type_id.to_string(),
                    message.name.to_string(),
                    message.message.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for message in &out {
                println!("[{}] {}", message.type_id, message.message);
            }
        }
    }
    Ok(SUCCESS)
}

fn decode_hex(input: &str, strict: bool) -> CliResult<Vec<TaggedMessage<Message>>> {
    let bytes = parse_hex(input)?;
    let policy = if strict {
        UnknownTypePolicy::Reject
    } else {
        UnknownTypePolicy::Skip
    };
    decode_multiple(&bytes, &MessageRegistry::with_defaults(), None, policy)
        .map_err(|err| frame_error("decode failed", err))
}

/// Hex digits, optionally separated by whitespace.
fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.split_whitespace().collect();
    hex::decode(digits)
        .map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::DATA_INVALID;

    #[test]
    fn parses_spaced_hex() {
        assert_eq!(parse_hex("00 0a\nFF").unwrap(), vec![0x00, 0x0a, 0xff]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_bad_hex() {
        assert_eq!(parse_hex("abc").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
    }

    #[test]
    fn decodes_back_to_back_frames() {
        // PingRequest, then SwitchCommandRequest{key: 7, state: true}.
        let messages = decode_hex("000007 000721 0d07000000 1001", false).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(MessageOutput::from(&messages[0]).name, "PingRequest");
        assert_eq!(messages[1].type_id(), 33);
    }

    #[test]
    fn unknown_type_is_skipped_unless_strict() {
        let input = "00 00 63 000008";
        let messages = decode_hex(input, false).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].type_id(), 8);

        assert_eq!(decode_hex(input, true).unwrap_err().code, DATA_INVALID);
    }

    #[test]
    fn truncated_frame_is_invalid_data() {
        assert_eq!(decode_hex("00 05 07 01", false).unwrap_err().code, DATA_INVALID);
    }
}
