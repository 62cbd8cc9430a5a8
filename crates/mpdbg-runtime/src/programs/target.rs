//! `target.py`: the default debug target. Line numbers below are the lines of
//! the module's source listing that each statement occupies.
use crate::error::RuntimeError;
use crate::frame::Namespace;
use crate::interpreter::Interpreter;
use crate::program::{EntryPoint, Module};
use crate::value::Value;

pub const SOURCE: &str = "target.py";

pub fn module() -> Module {
    Module {
        name: "target",
        source: SOURCE,
        globals,
        entry_points: &[
            EntryPoint {
                name: "main",
                routine: main,
            },
            EntryPoint {
                name: "inspect_local_variables",
                routine: inspect_local_variables,
            },
            EntryPoint {
                name: "mathematics",
                routine: mathematics,
            },
        ],
    }
}

fn globals() -> Namespace {
    Namespace::from_iter([
        ("__name__".to_string(), Value::str("target")),
        ("__file__".to_string(), Value::str(SOURCE)),
        ("APP_NAME".to_string(), Value::str("mpdbg demo")),
        ("counter".to_string(), Value::Int(0)),
    ])
}

pub fn inspect_local_variables(interp: &mut Interpreter) -> Result<Value, RuntimeError> {
    interp.line(21)?;
    interp.assign("number", Value::Int(42));
    interp.line(22)?;
    interp.assign("ratio", Value::Float(2.5));
    interp.line(23)?;
    interp.assign("greeting", Value::str("Hello, World!"));
    interp.line(24)?;
    interp.assign("nothing", Value::None);
    interp.line(25)?;
    interp.assign(
        "flags",
        Value::dict(vec![
            ("verbose".into(), true.into()),
            ("debug".into(), false.into()),
        ]),
    );
    interp.line(26)?;
    interp.assign(
        "sequence",
        Value::list(vec![1.into(), 2.into(), 3.into(), "hello".into()]),
    );
    interp.line(27)?;
    interp.assign("point", Value::tuple(vec![10.into(), 20.into()]));
    interp.line(28)?;
    interp.assign("unique", Value::set(vec![3.into(), 1.into(), 2.into()]));
    interp.line(29)?;
    let nested = Value::dict(vec![
        (
            "level1".into(),
            Value::dict(vec![(
                "level2".into(),
                Value::dict(vec![(
                    "level3".into(),
                    Value::list(vec!["deep".into(), "list".into()]),
                )]),
            )]),
        ),
        ("simple".into(), "value".into()),
    ]);
    interp.assign("nested", nested);
    interp.line(30)?;
    interp.assign("empty", Value::dict(vec![]));
    interp.line(31)?;
    interp.load("nested")
}

pub fn mathematics(interp: &mut Interpreter) -> Result<Value, RuntimeError> {
    interp.line(41)?;
    interp.assign("a", Value::Int(6));
    interp.line(42)?;
    interp.assign("b", Value::Int(7));
    interp.line(43)?;
    let product = interp
        .load_int("a")?
        .checked_mul(interp.load_int("b")?)
        .ok_or(RuntimeError::Overflow("a * b"))?;
    interp.assign("product", Value::Int(product));
    interp.line(44)?;
    interp.assign("squares", Value::list((0..5).map(|n| Value::Int(n * n)).collect()));
    interp.line(45)?;
    interp.load("product")
}

pub fn main(interp: &mut Interpreter) -> Result<Value, RuntimeError> {
    interp.line(78)?;
    interp.assign("x", Value::Int(78));

    for i in 0..3 {
        interp.line(79)?;
        interp.assign("i", Value::Int(i));
        interp.line(80)?;
        let loco = interp.call("inspect_local_variables", inspect_local_variables)?;
        interp.assign("loco", loco);
        interp.line(81)?;
        let total = interp.call("mathematics", mathematics)?;
        interp.assign("total", total);
        interp.line(82)?;
        let x = interp
            .load_int("x")?
            .checked_add(interp.load_int("total")?)
            .ok_or(RuntimeError::Overflow("x + total"))?;
        interp.assign("x", Value::Int(x));
        interp.line(83)?;
        let counter = interp
            .load_int("counter")?
            .checked_add(1)
            .ok_or(RuntimeError::Overflow("counter + 1"))?;
        interp.assign_global("counter", Value::Int(counter));
    }

    interp.line(89)?;
    let summary = Value::dict(vec![
        ("x".into(), interp.load("x")?),
        ("iterations".into(), interp.load("counter")?),
    ]);
    interp.assign("summary", summary);
    interp.line(90)?;
    interp.load("summary")
}
