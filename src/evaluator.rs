use crate::environment::{EnvError, Environment};
use crate::grammar::{Node, NodeKind};
use crate::source::Position;
use crate::types::{Procedure, Value};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("'{0}' object is not callable")]
    NotCallable(String, Position), // Type name of what was called
    #[error("{0}")]
    InvalidArguments(String, Position), // Raised by primitives
    #[error("{0} are not implemented")]
    NotImplemented(String, Position),
    #[error("maximum recursion depth of {0} exceeded")]
    RecursionLimit(usize, Position),
}

impl EvalError {
    /// Position of the node being evaluated when the error was raised.
    pub fn position(&self) -> Position {
        match self {
            EvalError::EnvError(EnvError::UndefinedVariable(_, pos))
            | EvalError::NotCallable(_, pos)
            | EvalError::InvalidArguments(_, pos)
            | EvalError::NotImplemented(_, pos)
            | EvalError::RecursionLimit(_, pos) => *pos,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            EvalError::EnvError(_) => "NameError",
            EvalError::NotCallable(..) => "TypeError",
            EvalError::InvalidArguments(..) => "ValueError",
            EvalError::NotImplemented(..) => "NotImplementedError",
            EvalError::RecursionLimit(..) => "RecursionError",
        }
    }
}

const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROWTH: usize = 4 * 1024 * 1024;

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EvalConfig {
    /// How many procedure invocations may be active at once.
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig { max_depth: 1000 }
    }
}

/// Tree-walking evaluator. Holds the configuration and the current call depth.
#[derive(Debug, Default)]
pub struct Evaluator {
    config: EvalConfig,
    depth: usize,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator::default()
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Evaluator { config, depth: 0 }
    }

    /// Evaluates each top-level form in order against `env` and returns the
    /// value of the last one.
    pub fn evaluate_program(
        &mut self,
        forms: &[Node],
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        let mut result = Value::Nil;
        for form in forms {
            tracing::debug!(form = %form, "evaluating top-level form");
            result = self.evaluate(form, env)?;
        }
        Ok(result)
    }

    /// Evaluates a given AST node within the specified environment.
    pub fn evaluate(&mut self, node: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
        match &node.kind {
            // Expressions
            NodeKind::Const(n) => Ok(Value::Number(*n)),
            NodeKind::Ident(name) => Ok(env.borrow().get(name, node.pos)?),
            NodeKind::Call { callee, args } => self.evaluate_call(callee, args, env, node.pos),
            NodeKind::BinOp { op, left, right } => {
                let op = self.evaluate(op, env)?;
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                self.apply(op, vec![left, right], node.pos)
            }
            NodeKind::Vector(items) => self.evaluate_sequence(items, env),

            // Statements
            NodeKind::If {
                clause,
                action,
                orelse,
            } => self.evaluate_if(clause, action, orelse.as_deref(), env),
            NodeKind::Let { target, body } => {
                let value = self.evaluate(body, env)?;
                // No new scope: the binding lands in the frame we were handed
                env.borrow_mut().define(target.as_str(), value);
                Ok(Value::Nil)
            }
            NodeKind::Function { params, body } => Ok(Value::Procedure(Rc::new(Procedure {
                params: params.clone(),
                body: body.clone(),
                closure: Rc::clone(env),
            }))),
            NodeKind::Macro { .. } => Err(EvalError::NotImplemented(
                "Macros".to_string(),
                node.pos,
            )),
        }
    }

    /// A parenthesized group: empty is nil, one item is that item's value and
    /// several items collect into a tuple.
    fn evaluate_sequence(&mut self, items: &[Node], env: &Rc<RefCell<Environment>>) -> EvalResult {
        match items {
            [] => Ok(Value::Nil),
            [single] => self.evaluate(single, env),
            many => Ok(Value::Tuple(
                many.iter()
                    .map(|item| self.evaluate(item, env))
                    .collect::<EvalResult<Vec<_>>>()?,
            )),
        }
    }

    fn evaluate_if(
        &mut self,
        clause: &Node,
        action: &Node,
        orelse: Option<&Node>,
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult {
        if self.evaluate(clause, env)?.is_truthy() {
            self.evaluate(action, env)
        } else {
            match orelse {
                Some(orelse) => self.evaluate(orelse, env),
                None => Ok(Value::Nil),
            }
        }
    }

    // Arguments become a flat positional list. A lone argument that evaluates
    // to a tuple is spread into its items.
    fn evaluate_args(
        &mut self,
        args: &[Node],
        env: &Rc<RefCell<Environment>>,
    ) -> EvalResult<Vec<Value>> {
        match args {
            [] => Ok(Vec::new()),
            [single] => match self.evaluate(single, env)? {
                Value::Tuple(items) => Ok(items),
                value => Ok(vec![value]),
            },
            many => many.iter().map(|arg| self.evaluate(arg, env)).collect(),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Node,
        args: &[Node],
        env: &Rc<RefCell<Environment>>,
        pos: Position,
    ) -> EvalResult {
        let args = self.evaluate_args(args, env)?;
        let callee = self.evaluate(callee, env)?;
        self.apply(callee, args, pos)
    }

    /// Invokes a callable value with already evaluated arguments.
    pub fn apply(&mut self, callee: Value, args: Vec<Value>, pos: Position) -> EvalResult {
        match callee {
            Value::Primitive(primitive) => (primitive.func)(args, pos),
            Value::Procedure(procedure) => self.call_procedure(&procedure, args, pos),
            other => Err(EvalError::NotCallable(other.type_name().to_string(), pos)),
        }
    }

    fn call_procedure(
        &mut self,
        procedure: &Procedure,
        args: Vec<Value>,
        pos: Position,
    ) -> EvalResult {
        if self.depth >= self.config.max_depth {
            tracing::warn!(max_depth = self.config.max_depth, %pos, "recursion limit reached");
            return Err(EvalError::RecursionLimit(self.config.max_depth, pos));
        }
        tracing::trace!(depth = self.depth, params = ?procedure.params, "calling procedure");

        // Parameters and arguments are paired up positionally; surplus
        // arguments are dropped and missing ones stay unbound.
        let frame = Environment::new_enclosed(Rc::clone(&procedure.closure));
        {
            let mut locals = frame.borrow_mut();
            for (name, value) in procedure.params.iter().zip(args) {
                locals.define(name.as_str(), value);
            }
        }

        self.depth += 1;
        // Each call nests several native frames, grow the stack on demand
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.evaluate_body(&procedure.body, &frame)
        });
        self.depth -= 1;
        result
    }

    // Forms run in order and the last one's value is the result.
    fn evaluate_body(&mut self, body: &[Node], env: &Rc<RefCell<Environment>>) -> EvalResult {
        let mut result = Value::Nil;
        for form in body {
            result = self.evaluate(form, env)?;
        }
        Ok(result)
    }
}

/// Evaluates `ast` against a fresh environment seeded from `builtins` and
/// returns the value of the last top-level form.
pub fn evaluate<I>(ast: &[Node], builtins: I) -> EvalResult
where
    I: IntoIterator<Item = (String, Value)>,
{
    let env = Environment::with_bindings(builtins);
    Evaluator::new().evaluate_program(ast, &env)
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Number;
    use crate::parser::parse_str;
    use crate::primitives::standard_builtins;

    fn run_with(input: &str, config: EvalConfig) -> EvalResult {
        let forms = match parse_str(input) {
            Ok(forms) => forms,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        let env = Environment::with_bindings(standard_builtins());
        Evaluator::with_config(config).evaluate_program(&forms, &env)
    }

    fn assert_eval(input: &str, expected: Value) {
        match run_with(input, EvalConfig::default()) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Compares error variants only, ignoring their payload
    fn assert_eval_error(input: &str, expected_error_variant: &EvalError) -> EvalError {
        match run_with(input, EvalConfig::default()) {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
                e
            }
        }
    }

    fn undefined() -> EvalError {
        EvalError::EnvError(EnvError::UndefinedVariable(String::new(), Position::default()))
    }

    #[test]
    fn test_eval_call() {
        assert_eval("(+ 1 2)", Value::int(3));
        assert_eval("(+ 1 (* 2 3))", Value::int(7));
        assert_eval("(- (+ 5 5) (* 2 3))", Value::int(4));
    }

    #[test]
    fn test_eval_constants_and_empty_program() {
        assert_eval("42", Value::int(42));
        assert_eval("2.5", Value::float(2.5));
        assert_eval("", Value::Nil);
        assert_eval("()", Value::Nil);
    }

    #[test]
    fn test_eval_let_persists_across_forms() {
        assert_eval("(let x (+ 1 2)) x", Value::int(3));
        assert_eval("(let x 1)", Value::Nil);
        assert_eval("(let x 1) (let x (+ x 1)) x", Value::int(2));
    }

    #[test]
    fn test_eval_if() {
        assert_eval("(if (> 2 1) 10 20)", Value::int(10));
        assert_eval("(if (> 1 2) 10 20)", Value::int(20));
        assert_eval("(if (> 1 2) 10)", Value::Nil);
        assert_eval("(if 0 10 else 20)", Value::int(20));
    }

    #[test]
    fn test_eval_if_does_not_evaluate_unused_branch() {
        assert_eval("(if 1 5 unbound_variable)", Value::int(5));
        assert_eval("(if 0 unbound_variable 6)", Value::int(6));
    }

    #[test]
    fn test_eval_immediately_applied_function() {
        assert_eval("(def (=> x (* x x)) 5)", Value::int(25));
    }

    #[test]
    fn test_eval_named_function() {
        assert_eval("(let sq (=> x (* x x))) (sq 7)", Value::int(49));
        assert_eval("(let add (=> a b (+ a b))) (add 2 3)", Value::int(5));
        assert_eval("(let five (=> (5))) (five)", Value::int(5));
    }

    #[test]
    fn test_eval_recursion() {
        assert_eval(
            "(let fact (=> n (if (<= n 1) 1 (* n (fact (- n 1)))))) (fact 10)",
            Value::int(3_628_800),
        );
        assert_eval(
            "(let fib (=> n (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))) (fib 15)",
            Value::int(610),
        );
    }

    #[test]
    fn test_eval_recursion_limit() {
        let config = EvalConfig { max_depth: 50 };
        match run_with("(let spin (=> n (spin n))) (spin 1)", config) {
            Err(EvalError::RecursionLimit(limit, _)) => assert_eq!(limit, 50),
            other => panic!("expected recursion limit, got {:?}", other),
        }
        // The depth counter unwinds, so the evaluator stays usable
        let mut evaluator = Evaluator::with_config(config);
        let env = Environment::with_bindings(standard_builtins());
        let forms = parse_str("(let spin (=> n (spin n))) (spin 1)").expect("parse");
        assert!(evaluator.evaluate_program(&forms, &env).is_err());
        let forms = parse_str("(let sq (=> x (* x x))) (sq 3)").expect("parse");
        assert_eq!(evaluator.evaluate_program(&forms, &env), Ok(Value::int(9)));
    }

    #[test]
    fn test_eval_closure_shares_defining_frame() {
        // The closure sees later rebinding of `n`: it captures the frame, not a copy
        assert_eval(
            "(let n 1) (let get (=> x (+ x n))) (let n 10) (get 1)",
            Value::int(11),
        );
        assert_eval(
            "(let make (=> k (=> x (+ x k)))) (let add5 (make 5)) (add5 1)",
            Value::int(6),
        );
    }

    #[test]
    fn test_eval_let_binds_into_current_frame() {
        // Inside a call the binding goes to the call's own frame
        let err = assert_eval_error("(let f (=> x (let y x))) (f 5) y", &undefined());
        assert!(matches!(
            err,
            EvalError::EnvError(EnvError::UndefinedVariable(ref name, _)) if name == "y"
        ));
        // `if` does not open a scope
        assert_eval("(if 1 (let z 3)) z", Value::int(3));
    }

    #[test]
    fn test_eval_multi_form_body_returns_last_value() {
        assert_eval("(def (=> x (+ x 1) (* x 2)) 5)", Value::int(10));
        assert_eval("(def (=> x (let y (* x 3)) (+ y 1)) 2)", Value::int(7));
    }

    #[test]
    fn test_eval_argument_binding_is_positional() {
        // Surplus arguments are dropped
        assert_eval("(def (=> x (+ x 0)) 1 2)", Value::int(1));
        // Missing arguments leave the parameter unbound
        assert_eval_error("(def (=> x y (+ x y)) 1)", &undefined());
    }

    #[test]
    fn test_eval_tuple_argument_is_spread() {
        assert_eval("(let add (=> a b (+ a b))) (add (tuple 1 2))", Value::int(3));
        assert_eval("(let add (=> a b (+ a b))) (add (3 4))", Value::int(7));
    }

    #[test]
    fn test_eval_vector_collects_values() {
        assert_eval(
            "((+ 1 2) (+ 3 4))",
            Value::Tuple(vec![Value::int(3), Value::int(7)]),
        );
        assert_eval("((+ 1 2))", Value::int(3));
    }

    #[test]
    fn test_eval_and_or_resolve_through_environment() {
        assert_eval("(and 1 0)", Value::int(0));
        assert_eval("(and 1 2)", Value::int(2));
        assert_eval("(or 0 5)", Value::int(5));
        assert_eval("(or (> 1 2) (< 1 2))", Value::Bool(true));

        let forms = parse_str("(and 1 2)").expect("parse");
        let err = evaluate(&forms, Vec::<(String, Value)>::new()).expect_err("and is not bound");
        assert_eq!(err.to_string(), "Variable and is undefined");
    }

    #[test]
    fn test_eval_undefined_variable() {
        let err = assert_eval_error("undefined_name", &undefined());
        assert_eq!(err.to_string(), "Variable undefined_name is undefined");
        assert_eq!(err.category(), "NameError");
        assert_eq!((err.position().row, err.position().col), (1, 0));
    }

    #[test]
    fn test_eval_not_callable() {
        let not_callable = EvalError::NotCallable(String::new(), Position::default());
        let err = assert_eval_error("(let x 1) (x 2)", &not_callable);
        assert_eq!(err.to_string(), "'int' object is not callable");
        assert_eq!(err.position().row, 1);
    }

    #[test]
    fn test_eval_macro_node_is_not_implemented() {
        let node = Node::new(
            NodeKind::Macro {
                name: "m".to_string(),
                definition: Box::new(Node::new_const(Number::Int(1), Position::default())),
            },
            Position::default(),
        );
        let err = evaluate(&[node], standard_builtins()).expect_err("macro should fail");
        assert!(matches!(err, EvalError::NotImplemented(..)));
        assert_eq!(err.category(), "NotImplementedError");
    }

    #[test]
    fn test_eval_is_deterministic() {
        let program = "(let sq (=> x (* x x))) (let n (sq 12)) (if (> n 100) (tuple n 1) 0)";
        let forms = parse_str(program).expect("parse");
        let first = evaluate(&forms, standard_builtins());
        let second = evaluate(&forms, standard_builtins());
        assert_eq!(first, second);
        assert_eq!(first, Ok(Value::Tuple(vec![Value::int(144), Value::int(1)])));
    }

    #[test]
    fn test_eval_function_value() {
        match run_with("(=> x y (+ x y))", EvalConfig::default()) {
            Ok(Value::Procedure(procedure)) => assert_eq!(procedure.params, vec!["x", "y"]),
            other => panic!("expected a procedure, got {:?}", other),
        }
    }
}
