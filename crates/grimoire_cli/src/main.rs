//! CLI entry point over the Grimoire core.
//!
//! # Responsibility
//! - Verify `grimoire_core` linkage and storage bootstrap from a shell.
//! - Run one translation lifecycle command per invocation and print JSON.
//!
//! Configuration comes from `GRIMOIRE_*` environment variables.

use grimoire_core::db::open_db;
use grimoire_core::{
    init_logging_from_config, parse_record_id, AddMode, CoreConfig, NewTranslation, RecordId,
    RecordKind, SqliteRecordStore, TranslationService, VariantContent,
};
use log::error;
use serde_json::{json, Value};
use std::process::ExitCode;

const KNOWN_FLAGS: &[&str] = &["--srd", "--overwrite"];

const USAGE: &str = "usage:
  grimoire ping
  grimoire create <spell|monster> <lang> <name> [--srd]
  grimoire add <record-id> <lang> <name> [--srd] [--overwrite]
  grimoire remove <record-id> <lang>
  grimoire delete <record-id>
  grimoire tag <record-id> <tag>
  grimoire show <record-id> [lang]
  grimoire languages";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(CliError::Usage(message)) => {
            eprintln!("{message}\n\n{USAGE}");
            ExitCode::from(2)
        }
        Err(CliError::Failed { code, message }) => {
            error!("event=cli_command module=cli status=error error_code={code}");
            println!("{}", json!({ "error": code, "message": message }));
            ExitCode::FAILURE
        }
    }
}

enum CliError {
    Usage(String),
    Failed { code: &'static str, message: String },
}

impl CliError {
    fn failed(code: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Failed {
            code,
            message: err.to_string(),
        }
    }
}

impl From<grimoire_core::TranslationServiceError> for CliError {
    fn from(value: grimoire_core::TranslationServiceError) -> Self {
        Self::failed(value.code(), &value)
    }
}

fn run(args: &[String]) -> Result<Value, CliError> {
    let (command, rest) = args
        .split_first()
        .ok_or_else(|| CliError::Usage("missing command".to_string()))?;

    let (positional, flags) = split_flags(rest)?;

    if command == "ping" {
        return Ok(json!({
            "ping": grimoire_core::ping(),
            "version": grimoire_core::core_version(),
        }));
    }

    let config = CoreConfig::from_env().map_err(|err| CliError::failed("invalid_config", err))?;
    init_logging_from_config(&config).map_err(|err| CliError::failed("logging_failed", err))?;
    let conn = open_db(&config.db_path)
        .map_err(|err| CliError::failed("storage_unavailable", err))?;
    let store = SqliteRecordStore::try_new(&conn)
        .map_err(|err| CliError::failed("storage_unavailable", err))?;
    let service =
        TranslationService::new(store).with_max_write_attempts(config.max_write_attempts);

    let is_protected = flags.contains(&"--srd");

    match (command.as_str(), positional.as_slice()) {
        ("create", [kind, language, name]) => {
            let kind = RecordKind::parse(kind)
                .ok_or_else(|| CliError::Usage(format!("unknown record kind `{kind}`")))?;
            let record = service.create_record(
                kind,
                vec![NewTranslation {
                    language: (*language).to_string(),
                    content: VariantContent::named(*name),
                    is_protected,
                }],
            )?;
            to_json(&record)
        }
        ("add", [id, language, name]) => {
            let mode = if flags.contains(&"--overwrite") {
                AddMode::Overwrite
            } else {
                AddMode::Insert
            };
            let added = service.add_translation(
                record_id(id)?,
                language,
                VariantContent::named(*name),
                is_protected,
                mode,
            )?;
            to_json(&added)
        }
        ("remove", [id, language]) => {
            let removed = service.remove_translation(record_id(id)?, language)?;
            to_json(&removed)
        }
        ("delete", [id]) => to_json(&service.delete_record(record_id(id)?)?),
        ("tag", [id, tag]) => {
            let tag = tag
                .parse::<i64>()
                .map_err(|_| CliError::Usage(format!("invalid tag `{tag}`")))?;
            let record = service.update_record_metadata(record_id(id)?, tag)?;
            to_json(&record.metadata())
        }
        ("show", [id]) => to_json(&service.get_projection(record_id(id)?, None)?),
        ("show", [id, language]) => {
            to_json(&service.get_projection(record_id(id)?, Some(*language))?)
        }
        ("languages", []) => to_json(&service.distinct_languages()?),
        _ => Err(CliError::Usage(format!("unrecognized command `{command}`"))),
    }
}

fn split_flags(args: &[String]) -> Result<(Vec<&str>, Vec<&str>), CliError> {
    let (positional, flags): (Vec<&str>, Vec<&str>) = args
        .iter()
        .map(String::as_str)
        .partition(|arg| !arg.starts_with("--"));
    if let Some(unknown) = flags.iter().find(|flag| !KNOWN_FLAGS.contains(*flag)) {
        return Err(CliError::Usage(format!("unknown flag `{unknown}`")));
    }
    Ok((positional, flags))
}

fn record_id(raw: &str) -> Result<RecordId, CliError> {
    parse_record_id(raw).ok_or_else(|| CliError::Usage(format!("invalid record id `{raw}`")))
}

fn to_json(value: &impl serde::Serialize) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(|err| CliError::failed("encode_failed", err))
}
