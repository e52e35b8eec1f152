//! Step-by-step assembly of one contract call.
//!
//! Each input event moves the session one transition. Nothing is executed
//! until the caller confirms a valid report and then calls
//! [`CallSession::execute`]; cancelling from any step leaves no side effect.

use std::fmt;

use serde_json::{Map, Value};

use crate::args::{parse_args_object, parse_argument_value};
use crate::inspector::SchemaSource;
use crate::strategy::ExecutionStrategy;
use crate::types::{ContractCall, ContractFunctionSchema, ParameterSchema, SimulationResult, ValidationReport};
use crate::validator::{is_valid_contract_id, validate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingContractId,
    AwaitingFunction,
    AwaitingParameter(usize),
    /// Function unknown or undocumented: arguments come as one JSON object.
    AwaitingArguments,
    Validating,
    Executing,
    Done,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionInput {
    Value(String),
    Confirm,
    Cancel,
}

#[derive(Debug)]
pub enum SessionError {
    /// Confirmation refused: the report has hard errors.
    Blocked(Box<ValidationReport>),
    /// The session already reached `Done` or `Cancelled`.
    Finished,
    /// The input does not fit the current step; the state is unchanged.
    Rejected(String),
    NotReady(SessionState),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Blocked(report) => match report.errors.first() {
                Some(first) => write!(f, "validation failed: {first}"),
                None => write!(f, "validation failed"),
            },
            SessionError::Finished => write!(f, "session already finished"),
            SessionError::Rejected(msg) => write!(f, "{msg}"),
            SessionError::NotReady(state) => write!(f, "cannot execute from {state:?}"),
        }
    }
}

impl std::error::Error for SessionError {}

pub struct CallSession<'s> {
    schema_source: &'s dyn SchemaSource,
    state: SessionState,
    network: Option<String>,
    contract_id: String,
    function_name: String,
    schemas: Vec<ContractFunctionSchema>,
    selected: Option<ContractFunctionSchema>,
    args: Map<String, Value>,
    report: Option<ValidationReport>,
    result: Option<SimulationResult>,
}

impl<'s> CallSession<'s> {
    pub fn new(schema_source: &'s dyn SchemaSource) -> Self {
        Self {
            schema_source,
            state: SessionState::AwaitingContractId,
            network: None,
            contract_id: String::new(),
            function_name: String::new(),
            schemas: Vec::new(),
            selected: None,
            args: Map::new(),
            report: None,
            result: None,
        }
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = network;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn schemas(&self) -> &[ContractFunctionSchema] {
        &self.schemas
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    pub fn result(&self) -> Option<&SimulationResult> {
        self.result.as_ref()
    }

    /// The parameter the next `Value` input fills.
    pub fn current_parameter(&self) -> Option<&ParameterSchema> {
        match self.state {
            SessionState::AwaitingParameter(i) => self.selected.as_ref()?.parameters.get(i),
            _ => None,
        }
    }

    pub fn handle(&mut self, input: SessionInput) -> Result<SessionState, SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::Finished);
        }
        let value = match input {
            SessionInput::Cancel => {
                self.state = SessionState::Cancelled;
                return Ok(self.state);
            }
            SessionInput::Confirm => return self.confirm(),
            SessionInput::Value(v) => v,
        };
        match self.state {
            SessionState::AwaitingContractId => self.accept_contract_id(&value),
            SessionState::AwaitingFunction => self.accept_function(&value),
            SessionState::AwaitingParameter(i) => self.accept_parameter(i, &value),
            SessionState::AwaitingArguments => self.accept_arguments(&value),
            SessionState::Validating => {
                Err(SessionError::Rejected("expected confirmation or cancel".to_string()))
            }
            SessionState::Executing => {
                Err(SessionError::Rejected("call is ready to execute".to_string()))
            }
            SessionState::Done | SessionState::Cancelled => Err(SessionError::Finished),
        }?;
        Ok(self.state)
    }

    fn accept_contract_id(&mut self, raw: &str) -> Result<(), SessionError> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(SessionError::Rejected("Contract ID is required".to_string()));
        }
        if !is_valid_contract_id(id) {
            return Err(SessionError::Rejected(
                "Invalid contract ID format (should start with C and be 56 characters)".to_string(),
            ));
        }
        self.contract_id = id.to_string();
        self.schemas = self.schema_source.load_schemas(id);
        self.state = SessionState::AwaitingFunction;
        Ok(())
    }

    fn accept_function(&mut self, raw: &str) -> Result<(), SessionError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(SessionError::Rejected("Function name is required".to_string()));
        }
        self.function_name = name.to_string();
        self.selected = self.schemas.iter().find(|f| f.name == name).cloned();
        match self.selected.as_ref().map(|s| s.parameters.len()) {
            Some(0) => self.enter_validating(),
            Some(_) => self.state = SessionState::AwaitingParameter(0),
            None => self.state = SessionState::AwaitingArguments,
        }
        Ok(())
    }

    fn accept_parameter(&mut self, index: usize, raw: &str) -> Result<(), SessionError> {
        let Some(param) = self.current_parameter().cloned() else {
            return Err(SessionError::Rejected(format!("no parameter at position {index}")));
        };
        if raw.trim().is_empty() {
            if param.required {
                return Err(SessionError::Rejected(format!(
                    "A value for `{}` is required",
                    param.name
                )));
            }
        } else {
            self.args.insert(param.name.clone(), parse_argument_value(raw));
        }
        let total = self.selected.as_ref().map_or(0, |s| s.parameters.len());
        if index + 1 < total {
            self.state = SessionState::AwaitingParameter(index + 1);
        } else {
            self.enter_validating();
        }
        Ok(())
    }

    fn accept_arguments(&mut self, raw: &str) -> Result<(), SessionError> {
        self.args = parse_args_object(raw).map_err(SessionError::Rejected)?;
        self.enter_validating();
        Ok(())
    }

    fn enter_validating(&mut self) {
        self.report = Some(validate(
            &self.contract_id,
            &self.function_name,
            &self.args,
            self.selected.as_ref(),
            &self.schemas,
        ));
        self.state = SessionState::Validating;
    }

    fn confirm(&mut self) -> Result<SessionState, SessionError> {
        if self.state != SessionState::Validating {
            return Err(SessionError::Rejected(format!(
                "nothing to confirm while {:?}",
                self.state
            )));
        }
        match &self.report {
            Some(report) if report.valid => {
                self.state = SessionState::Executing;
                Ok(self.state)
            }
            Some(report) => Err(SessionError::Blocked(Box::new(report.clone()))),
            None => Err(SessionError::Rejected("no validation report".to_string())),
        }
    }

    /// The assembled call, once validation has passed.
    pub fn call(&self) -> Option<ContractCall> {
        if !matches!(self.state, SessionState::Executing | SessionState::Done) {
            return None;
        }
        Some(ContractCall {
            contract_id: self.contract_id.clone(),
            function_name: self.function_name.clone(),
            args: self.args.clone(),
            network: self.network.clone(),
        })
    }

    pub fn execute(&mut self, strategy: &dyn ExecutionStrategy) -> Result<&SimulationResult, SessionError> {
        if self.state != SessionState::Executing {
            return Err(SessionError::NotReady(self.state));
        }
        let Some(call) = self.call() else {
            return Err(SessionError::NotReady(self.state));
        };
        let result = strategy.simulate(&call);
        self.state = SessionState::Done;
        Ok(self.result.insert(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::LOCAL_STRATEGY;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    const ID: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";
    const ACCOUNT: &str = "GDIY6AQQ75WMD4W46EYB7O6UYMHOCGQHLAQGQTKHDX4J2DYQCHVCQYFD";

    struct FixedSchemas(Vec<ContractFunctionSchema>);

    impl SchemaSource for FixedSchemas {
        fn load_schemas(&self, _contract_id: &str) -> Vec<ContractFunctionSchema> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingStrategy {
        calls: Cell<usize>,
        last: RefCell<Option<ContractCall>>,
    }

    impl ExecutionStrategy for RecordingStrategy {
        fn name(&self) -> &'static str {
            LOCAL_STRATEGY
        }

        fn simulate(&self, call: &ContractCall) -> SimulationResult {
            self.calls.set(self.calls.get() + 1);
            *self.last.borrow_mut() = Some(call.clone());
            SimulationResult {
                success: true,
                strategy: LOCAL_STRATEGY.to_string(),
                result: Some(json!("ok")),
                ..Default::default()
            }
        }
    }

    fn source() -> FixedSchemas {
        FixedSchemas(vec![
            ContractFunctionSchema {
                name: "transfer".to_string(),
                description: None,
                parameters: vec![
                    ParameterSchema {
                        name: "to".to_string(),
                        type_hint: Some("Address".to_string()),
                        required: true,
                        description: None,
                    },
                    ParameterSchema {
                        name: "memo".to_string(),
                        type_hint: Some("String".to_string()),
                        required: false,
                        description: None,
                    },
                ],
            },
            ContractFunctionSchema::bare("pause"),
        ])
    }

    fn value(s: &str) -> SessionInput {
        SessionInput::Value(s.to_string())
    }

    #[test]
    fn parameters_are_collected_in_order_then_executed_once() {
        let schemas = source();
        let strategy = RecordingStrategy::default();
        let mut session = CallSession::new(&schemas).with_network(Some("testnet".to_string()));
        assert_eq!(session.handle(value(ID)).unwrap(), SessionState::AwaitingFunction);
        assert_eq!(session.handle(value("transfer")).unwrap(), SessionState::AwaitingParameter(0));
        assert_eq!(session.current_parameter().map(|p| p.name.as_str()), Some("to"));
        assert_eq!(session.handle(value(ACCOUNT)).unwrap(), SessionState::AwaitingParameter(1));
        assert_eq!(session.handle(value("")).unwrap(), SessionState::Validating);
        assert!(session.report().expect("report").valid);
        assert_eq!(strategy.calls.get(), 0);
        assert_eq!(session.handle(SessionInput::Confirm).unwrap(), SessionState::Executing);
        let result = session.execute(&strategy).expect("execute");
        assert!(result.success);
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(strategy.calls.get(), 1);
        let sent = strategy.last.borrow().clone().expect("call");
        assert_eq!(sent.args, json!({"to": ACCOUNT}).as_object().cloned().unwrap());
        assert_eq!(sent.network.as_deref(), Some("testnet"));
    }

    #[test]
    fn function_without_parameters_goes_straight_to_validation() {
        let schemas = source();
        let mut session = CallSession::new(&schemas);
        session.handle(value(ID)).unwrap();
        assert_eq!(session.handle(value("pause")).unwrap(), SessionState::Validating);
    }

    #[test]
    fn unknown_function_takes_a_json_object() {
        let schemas = source();
        let mut session = CallSession::new(&schemas);
        session.handle(value(ID)).unwrap();
        assert_eq!(session.handle(value("mint")).unwrap(), SessionState::AwaitingArguments);
        let err = session.handle(value("[1]")).expect_err("array rejected");
        assert!(matches!(err, SessionError::Rejected(_)));
        assert_eq!(session.state(), SessionState::AwaitingArguments);
        assert_eq!(session.handle(value("{\"n\": 1}")).unwrap(), SessionState::Validating);
        let report = session.report().expect("report");
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn invalid_contract_id_is_rejected_without_loading() {
        let schemas = source();
        let mut session = CallSession::new(&schemas);
        assert!(matches!(session.handle(value("C123")), Err(SessionError::Rejected(_))));
        assert_eq!(session.state(), SessionState::AwaitingContractId);
        assert!(session.schemas().is_empty());
    }

    #[test]
    fn required_parameter_cannot_be_left_blank() {
        let schemas = source();
        let mut session = CallSession::new(&schemas);
        session.handle(value(ID)).unwrap();
        session.handle(value("transfer")).unwrap();
        assert!(session.handle(value("  ")).is_err());
        assert_eq!(session.state(), SessionState::AwaitingParameter(0));
    }

    #[test]
    fn cancel_from_any_step_prevents_execution() {
        let schemas = source();
        let strategy = RecordingStrategy::default();
        let steps: [&[&str]; 4] = [&[], &[ID], &[ID, "transfer"], &[ID, "pause"]];
        for inputs in steps {
            let mut session = CallSession::new(&schemas);
            for input in inputs {
                session.handle(value(input)).unwrap();
            }
            assert_eq!(session.handle(SessionInput::Cancel).unwrap(), SessionState::Cancelled);
            assert!(matches!(session.handle(SessionInput::Confirm), Err(SessionError::Finished)));
            assert!(matches!(session.execute(&strategy), Err(SessionError::NotReady(_))));
        }
        assert_eq!(strategy.calls.get(), 0);
    }

    #[test]
    fn blocked_report_keeps_state_and_never_executes() {
        let burn = ContractFunctionSchema {
            name: "burn".to_string(),
            description: None,
            parameters: vec![ParameterSchema {
                name: "amount".to_string(),
                type_hint: Some("i128".to_string()),
                required: true,
                description: None,
            }],
        };
        let schemas = FixedSchemas(vec![burn.clone()]);
        let strategy = RecordingStrategy::default();
        let mut session = CallSession::new(&schemas);
        session.handle(value(ID)).unwrap();
        // Inputs reject a blank required value, so stage the missing argument directly.
        session.function_name = burn.name.clone();
        session.selected = Some(burn);
        session.enter_validating();
        let err = session.handle(SessionInput::Confirm).expect_err("blocked");
        assert!(matches!(err, SessionError::Blocked(ref r) if !r.valid));
        assert_eq!(session.state(), SessionState::Validating);
        assert!(session.execute(&strategy).is_err());
        assert_eq!(strategy.calls.get(), 0);
    }
}
