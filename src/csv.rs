use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::controller::Controller;
use crate::hardware::Hardware;
use crate::log::EventLog;
use crate::model::{ButtonId, Channel, Index, MachineMode, Subsystem};
use crate::sim::{SimCommand, SimMachine};
use crate::Cents;

/// Errors that can occur when reading an operator script
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to open script: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized action '{action}'")]
    UnrecognizedAction { line: usize, action: String },

    #[error("line {line}: unrecognized channel '{channel}'")]
    UnrecognizedChannel { line: usize, channel: String },

    #[error("line {line}: {action} missing {field}")]
    MissingField {
        line: usize,
        action: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    action: String,
    channel: Option<String>,
    index: Option<Index>,
    value: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    key: &'a str,
    value: String,
}

impl InputRow {
    fn index(&self, line: usize) -> Result<Index, ScriptError> {
        self.index.ok_or_else(|| self.missing(line, "index"))
    }

    fn value(&self, line: usize) -> Result<u32, ScriptError> {
        self.value.ok_or_else(|| self.missing(line, "value"))
    }

    fn missing(&self, line: usize, field: &'static str) -> ScriptError {
        ScriptError::MissingField {
            line,
            action: self.action.clone(),
            field,
        }
    }

    fn channel(&self, line: usize) -> Result<Channel, ScriptError> {
        let name = self
            .channel
            .as_deref()
            .ok_or_else(|| self.missing(line, "channel"))?;
        let channel = match name {
            "coin_rack" => Channel::CoinRack(self.index(line)?),
            "product_rack" => Channel::ProductRack(self.index(line)?),
            "button" => Channel::SelectionButton(self.index(line)?),
            "coin_slot" => Channel::Other(Subsystem::CoinSlot),
            "receptacle" => Channel::Other(Subsystem::CoinReceptacle),
            "coin_return" => Channel::Other(Subsystem::CoinReturn),
            "display" => Channel::Other(Subsystem::Display),
            "config_panel" => Channel::Other(Subsystem::ConfigurationPanel),
            other => {
                return Err(ScriptError::UnrecognizedChannel {
                    line,
                    channel: other.to_string(),
                });
            }
        };
        Ok(channel)
    }

    fn into_command(self, line: usize) -> Result<SimCommand, ScriptError> {
        let command = match self.action.as_str() {
            "insert" => SimCommand::InsertCoin(Cents::new(self.value(line)?)),
            "press" => {
                let button = match self.channel.as_deref() {
                    None | Some("button") => ButtonId::Selection(self.index(line)?),
                    Some("config") => ButtonId::Config(self.index(line)?),
                    Some("enter") => ButtonId::ConfigEnter,
                    Some(other) => {
                        return Err(ScriptError::UnrecognizedChannel {
                            line,
                            channel: other.to_string(),
                        });
                    }
                };
                SimCommand::Press(button)
            }
            "load" => match self.channel(line)? {
                Channel::CoinRack(rack) => SimCommand::LoadCoins {
                    rack,
                    count: self.value(line)?,
                },
                Channel::ProductRack(rack) => SimCommand::LoadProducts {
                    rack,
                    count: self.value(line)?,
                },
                other => {
                    return Err(ScriptError::UnrecognizedChannel {
                        line,
                        channel: other.to_string(),
                    });
                }
            },
            "unload" => SimCommand::UnloadCoins(self.index(line)?),
            "enable" => SimCommand::Enable(self.channel(line)?),
            "disable" => SimCommand::Disable(self.channel(line)?),
            "empty" => SimCommand::EmptyReceptacle,
            other => {
                return Err(ScriptError::UnrecognizedAction {
                    line,
                    action: other.to_string(),
                });
            }
        };
        Ok(command)
    }
}

/// Read operator commands from a csv script with the header
/// `action,channel,index,value`.
pub fn read_script(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<SimCommand, ScriptError>>, ScriptError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(ScriptError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| ScriptError::Parse { line, source })?;
            row.into_command(line)
        }))
}

/// Final machine state as `key,value` pairs. Money is in cents.
pub fn machine_report<L: EventLog>(controller: &Controller<SimMachine, L>) -> Vec<(String, String)> {
    let sim = controller.hardware();
    let returned: Cents = sim.coin_return().iter().copied().sum();
    let mode = match controller.mode() {
        MachineMode::Operational => "operational",
        MachineMode::Fault => "fault",
    };

    let mut rows = vec![
        ("credit".to_string(), controller.credit().get().to_string()),
        ("display".to_string(), controller.current_message().to_string()),
        (
            "exact_change".to_string(),
            controller.exact_change_light().to_string(),
        ),
        (
            "out_of_order".to_string(),
            controller.out_of_order_light().to_string(),
        ),
        ("mode".to_string(), mode.to_string()),
        ("returned".to_string(), returned.get().to_string()),
        ("delivered".to_string(), sim.delivered().len().to_string()),
    ];
    for rack in 0..sim.coin_rack_count() {
        rows.push((
            format!("rack_{}", sim.coin_kind(rack).get()),
            sim.coins_in_rack(rack).to_string(),
        ));
    }
    rows
}

/// write the report in csv format
pub fn write_report<W: io::Write>(
    writer: W,
    rows: impl IntoIterator<Item = (String, String)>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for (key, value) in rows {
        writer.serialize(OutputRow { key: &key, value })?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn commands(content: &str) -> Vec<Result<SimCommand, ScriptError>> {
        let file = write_csv(content);
        read_script(file.path()).unwrap().collect()
    }

    #[test]
    fn read_operator_actions() {
        let results = commands(
            "action,channel,index,value\n\
             insert,,,25\n\
             press,,2,\n\
             press,config,4,\n\
             press,enter,,\n\
             load,coin_rack,1,10\n\
             load,product_rack,0,5\n\
             unload,coin_rack,3,\n\
             disable,receptacle,,\n\
             enable,button,1,\n\
             empty,,,\n",
        );
        let commands: Vec<_> = results.into_iter().map(Result::unwrap).collect();

        assert_eq!(
            commands,
            [
                SimCommand::InsertCoin(Cents::new(25)),
                SimCommand::Press(ButtonId::Selection(2)),
                SimCommand::Press(ButtonId::Config(4)),
                SimCommand::Press(ButtonId::ConfigEnter),
                SimCommand::LoadCoins { rack: 1, count: 10 },
                SimCommand::LoadProducts { rack: 0, count: 5 },
                SimCommand::UnloadCoins(3),
                SimCommand::Disable(Channel::Other(Subsystem::CoinReceptacle)),
                SimCommand::Enable(Channel::SelectionButton(1)),
                SimCommand::EmptyReceptacle,
            ]
        );
    }

    #[test]
    fn read_with_whitespace() {
        let results = commands("action, channel, index, value\ninsert, , , 100\n");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_action() {
        let results = commands("action,channel,index,value\nkick,,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, ScriptError::UnrecognizedAction { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_unknown_channel() {
        let results = commands("action,channel,index,value\nenable,door,,\n");
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, ScriptError::UnrecognizedChannel { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_value() {
        let results = commands("action,channel,index,value\ninsert,,,25\ninsert,,,\n");
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert!(matches!(
            err,
            ScriptError::MissingField {
                line: 3,
                field: "value",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            read_script("does/not/exist.csv"),
            Err(ScriptError::Open(_))
        ));
    }

    #[test]
    fn report_is_key_value_csv() {
        let mut out = Vec::new();
        write_report(
            &mut out,
            [
                ("credit".to_string(), "50".to_string()),
                ("display".to_string(), "Current Credit: $0.50".to_string()),
            ],
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "key,value\ncredit,50\ndisplay,Current Credit: $0.50\n"
        );
    }
}
