//! Line-oriented front end for [`CallSession`]: prompts on one stream, reads
//! answers from another, and feeds every answer to the session as an input
//! event. End of input cancels.

use std::io::{self, BufRead, Write};

use serde_json::Value;

use crate::autocomplete::{AutocompleteEngine, SuggestionContext, SuggestionFilter};
use crate::cmdctx::CmdCtx;
use crate::contract_cmds::report_lines;
use crate::error::{EXIT_OK, EXIT_RUNTIME, EXIT_VALIDATION, format_error};
use crate::history::HistoryStore;
use crate::inspector::{ContractInspector, SchemaSource};
use crate::runlog::RunLog;
use crate::session::{CallSession, SessionError, SessionInput, SessionState};
use crate::state::{last_contract_id, remember_contract_id};
use crate::strategy::{ExecutionStrategy, select_strategy};
use crate::types::HistoryEntry;

const SHOWN_SUGGESTIONS: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub final_state: SessionState,
    pub blocked: bool,
    pub success: bool,
    /// Set once a call passed validation.
    pub validated_contract_id: Option<String>,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self.final_state {
            SessionState::Done if self.success => EXIT_OK,
            SessionState::Done => EXIT_RUNTIME,
            _ if self.blocked => EXIT_VALIDATION,
            _ => EXIT_OK,
        }
    }
}

pub struct InteractiveRun<'a> {
    pub source: &'a dyn SchemaSource,
    pub strategy: &'a dyn ExecutionStrategy,
    pub log: &'a RunLog,
    pub network: Option<String>,
    pub default_contract_id: Option<String>,
}

fn read_answer<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn write_suggestions<W: Write>(
    out: &mut W,
    engine: &AutocompleteEngine,
    ctx: &SuggestionContext,
) -> io::Result<()> {
    let filter = SuggestionFilter {
        kinds: None,
        limit: Some(SHOWN_SUGGESTIONS),
    };
    let found = engine.get_suggestions(ctx, Some(&filter)).suggestions;
    if found.is_empty() {
        return Ok(());
    }
    let values: Vec<&str> = found.iter().map(|s| s.value.as_str()).collect();
    writeln!(out, "  suggestions: {}", values.join(", "))
}

impl InteractiveRun<'_> {
    fn remember(&self, engine: &mut AutocompleteEngine, entry: HistoryEntry) {
        if let Err(e) = engine.record_input(entry) {
            self.log.warn("history.save_failed", e.to_string());
        }
    }

    pub fn drive<R: BufRead, W: Write>(
        &self,
        engine: &mut AutocompleteEngine,
        input: &mut R,
        out: &mut W,
    ) -> io::Result<Outcome> {
        let mut session = CallSession::new(self.source).with_network(self.network.clone());
        let mut outcome = Outcome {
            final_state: SessionState::AwaitingContractId,
            blocked: false,
            success: false,
            validated_contract_id: None,
        };

        loop {
            let before = session.state();
            let event = match before {
                SessionState::AwaitingContractId => {
                    match &self.default_contract_id {
                        Some(id) => write!(out, "Contract ID [{id}]: ")?,
                        None => write!(out, "Contract ID: ")?,
                    }
                    out.flush()?;
                    match read_answer(input)? {
                        Some(line) if line.trim().is_empty() => SessionInput::Value(
                            self.default_contract_id.clone().unwrap_or_default(),
                        ),
                        Some(line) => SessionInput::Value(line),
                        None => SessionInput::Cancel,
                    }
                }
                SessionState::AwaitingFunction => {
                    let ctx = SuggestionContext::for_function(session.contract_id(), "");
                    write_suggestions(out, engine, &ctx)?;
                    write!(out, "Function: ")?;
                    out.flush()?;
                    read_answer(input)?.map_or(SessionInput::Cancel, SessionInput::Value)
                }
                SessionState::AwaitingParameter(_) => {
                    let Some(param) = session.current_parameter().cloned() else {
                        break;
                    };
                    let ctx = SuggestionContext::for_parameter(
                        session.contract_id(),
                        session.function_name(),
                        &param.name,
                        param.type_hint.as_deref(),
                        "",
                    );
                    write_suggestions(out, engine, &ctx)?;
                    let ty = param.type_hint.as_deref().unwrap_or("value");
                    let optional = if param.required { "" } else { ", optional" };
                    write!(out, "{} ({ty}{optional}): ", param.name)?;
                    out.flush()?;
                    read_answer(input)?.map_or(SessionInput::Cancel, SessionInput::Value)
                }
                SessionState::AwaitingArguments => {
                    writeln!(
                        out,
                        "No parameter list for `{}`; enter arguments as one JSON object.",
                        session.function_name()
                    )?;
                    write!(out, "Arguments: ")?;
                    out.flush()?;
                    read_answer(input)?.map_or(SessionInput::Cancel, SessionInput::Value)
                }
                SessionState::Validating => {
                    let Some(report) = session.report() else {
                        break;
                    };
                    for line in report_lines(report) {
                        writeln!(out, "{line}")?;
                    }
                    if !report.valid {
                        outcome.blocked = true;
                        writeln!(out, "Fix the errors above and start again.")?;
                        SessionInput::Cancel
                    } else {
                        let warned = report.has_warnings();
                        write!(out, "Simulate now? {}: ", if warned { "[y/N]" } else { "[Y/n]" })?;
                        out.flush()?;
                        match read_answer(input)?.map(|a| a.trim().to_ascii_lowercase()) {
                            Some(a) if a == "y" || a == "yes" => SessionInput::Confirm,
                            Some(a) if a.is_empty() && !warned => SessionInput::Confirm,
                            _ => SessionInput::Cancel,
                        }
                    }
                }
                SessionState::Executing => {
                    outcome.validated_contract_id = Some(session.contract_id().to_string());
                    let result = match session.execute(self.strategy) {
                        Ok(result) => result,
                        Err(e) => {
                            writeln!(out, "{e}")?;
                            break;
                        }
                    };
                    outcome.success = result.success;
                    if result.success {
                        let shown = match &result.result {
                            Some(Value::String(s)) => s.clone(),
                            Some(v) => v.to_string(),
                            None => String::new(),
                        };
                        writeln!(out, "Simulation succeeded ({}): {shown}", result.strategy)?;
                    } else {
                        writeln!(out, "Simulation failed ({})", result.strategy)?;
                        if let Some(summary) = &result.error_summary {
                            writeln!(out, "ERROR: {summary}")?;
                        }
                        for s in &result.suggestions {
                            writeln!(out, "HINT: {s}")?;
                        }
                    }
                    continue;
                }
                SessionState::Done | SessionState::Cancelled => break,
            };

            let is_value = matches!(event, SessionInput::Value(_));
            match session.handle(event) {
                Ok(after) => {
                    if is_value {
                        self.after_value(engine, &session, before, after);
                    }
                }
                Err(SessionError::Blocked(report)) => {
                    outcome.blocked = true;
                    writeln!(out, "{}", SessionError::Blocked(report))?;
                }
                Err(e) => writeln!(out, "  {e}")?,
            }
        }

        outcome.final_state = session.state();
        if outcome.final_state == SessionState::Cancelled {
            writeln!(out, "Cancelled.")?;
        }
        Ok(outcome)
    }

    /// Feeds an accepted answer back into autocomplete. History is written
    /// only once the assembled call passes validation.
    fn after_value(
        &self,
        engine: &mut AutocompleteEngine,
        session: &CallSession<'_>,
        before: SessionState,
        after: SessionState,
    ) {
        if before == SessionState::AwaitingContractId {
            engine.set_contract_functions(session.schemas().to_vec());
        }
        if after != SessionState::Validating {
            return;
        }
        self.log.info(
            "session.validated",
            format!("{} {}", session.contract_id(), session.function_name()),
        );
        if session.report().is_some_and(|r| r.valid) {
            for entry in validated_entries(session) {
                self.remember(engine, entry);
            }
        }
    }
}

/// The function name, then each supplied argument, of a validated call.
fn validated_entries(session: &CallSession<'_>) -> Vec<HistoryEntry> {
    let entry = |value: String, parameter_name: Option<String>| HistoryEntry {
        value,
        contract_id: session.contract_id().to_string(),
        function_name: session.function_name().to_string(),
        parameter_name,
    };
    let mut entries = vec![entry(session.function_name().to_string(), None)];
    entries.extend(session.args().iter().map(|(name, value)| {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        entry(value, Some(name.clone()))
    }));
    entries
}

pub fn cmd_interactive(ctx: &CmdCtx, args: &[String]) -> i32 {
    if !args.is_empty() {
        eprintln!("Usage: {} interactive", ctx.app_name);
        return crate::error::EXIT_USAGE;
    }
    if !ctx.require_valid_config("interactive") {
        return EXIT_RUNTIME;
    }
    let history = ctx.load_history().unwrap_or_else(|e| {
        ctx.log.warn("history.load_failed", e.to_string());
        HistoryStore::in_memory(ctx.config.history_limit)
    });
    let default_contract_id =
        last_contract_id().or_else(|| history.last_contract_id().map(ToOwned::to_owned));
    let mut engine = AutocompleteEngine::new(history);
    engine.set_last_contract_id(default_contract_id.clone());

    let inspector = ContractInspector::new(ctx.config, ctx.runner, ctx.log);
    let strategy = select_strategy(ctx.config, ctx.config.use_local_cli, ctx.runner, ctx.log);
    let run = InteractiveRun {
        source: &inspector,
        strategy: strategy.as_ref(),
        log: ctx.log,
        network: None,
        default_contract_id,
    };
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();
    match run.drive(&mut engine, &mut input, &mut out) {
        Ok(outcome) => {
            if let Some(id) = &outcome.validated_contract_id
                && let Err(e) = remember_contract_id(id)
            {
                ctx.log.warn("state.write_failed", e);
            }
            outcome.exit_code()
        }
        Err(e) => {
            eprintln!("{}", format_error("Interactive session", &e));
            EXIT_RUNTIME
        }
    }
}
