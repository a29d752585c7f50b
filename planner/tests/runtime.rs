use std::collections::BTreeMap;

use flowl::ResolveError;
use planner::{Driver, DriverError, DriverFactory, DriverRegistry, FuncNode, NodeId, RunQ, compile};

/// Returns its merged arguments as results.
#[derive(Debug)]
struct EchoDriver {
    function: String,
    args: BTreeMap<String, String>,
    loads: usize,
}

impl Driver for EchoDriver {
    fn load(&mut self) -> Result<(), DriverError> {
        self.loads += 1;
        Ok(())
    }

    fn merge_args(&mut self, args: &BTreeMap<String, String>) -> Result<(), DriverError> {
        self.args.extend(args.clone());
        Ok(())
    }

    fn invoke(&mut self) -> Result<BTreeMap<String, String>, DriverError> {
        if self.loads == 0 {
            return Err(DriverError::Invoke("not loaded".to_string()));
        }
        Ok(self.args.clone())
    }

    fn function_name(&self) -> &str {
        &self.function
    }
}

struct EchoFactory;

impl DriverFactory for EchoFactory {
    fn kind(&self) -> &str {
        "echo"
    }

    fn create(&self, path: &str) -> Option<Box<dyn Driver>> {
        let function = path.rsplit('/').next()?.to_string();
        Some(Box::new(EchoDriver {
            function,
            args: BTreeMap::new(),
            loads: 0,
        }))
    }
}

fn plan(source: &str) -> RunQ {
    let mut drivers = DriverRegistry::default();
    drivers.register(EchoFactory);
    compile(source, 0, &drivers).expect("compile failed")
}

fn node_ids(q: &RunQ) -> Vec<NodeId> {
    q.iter_nodes().map(|(_, id, _)| id).collect()
}

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Load, configure and invoke one node, saving what it returns.
fn step(q: &mut RunQ, id: NodeId) -> BTreeMap<String, String> {
    q.load(id).unwrap();
    q.merge_args(id).unwrap();
    let returns = q.invoke(id).unwrap();
    q.save_returns(id, &returns, None);
    returns
}

#[test]
fn inline_args_replace_configured_args() {
    let configured = "load cmd:/bin/f1
fn n1 = f1 {
    args {
        k = 1
        extra = x
    }
}
";
    let q = plan(&format!("{}run n1 {{\n    k: 2\n}}", configured));
    let id = node_ids(&q)[0];
    assert_eq!(q.args(id).unwrap(), map(&[("k", "2")]));

    let q = plan(&format!("{}run n1", configured));
    let id = node_ids(&q)[0];
    assert_eq!(q.args(id).unwrap(), map(&[("k", "1"), ("extra", "x")]));

    let q = plan(&format!("{}run n1 {{\n}}", configured));
    let id = node_ids(&q)[0];
    assert!(q.args(id).unwrap().is_empty());
}

#[test]
fn args_expand_variables() {
    let q = plan(
        "var host = example.org
var url = http://$host
load cmd:/bin/f1
fn n1 = f1 {
    args {
        u = $(url)/a
    }
}
run n1
run f1 {
    u: $url/b
}",
    );
    let ids = node_ids(&q);
    assert_eq!(q.args(ids[0]).unwrap()["u"], "http://example.org/a");
    assert_eq!(q.args(ids[1]).unwrap()["u"], "http://example.org/b");
}

#[test]
fn undefined_variable_in_args() {
    let q = plan("load cmd:/bin/f1\nrun f1 {\n  k: $missing\n}");
    let id = node_ids(&q)[0];
    assert_eq!(
        q.args(id),
        Err(ResolveError::UndefinedVariable("missing".to_string()))
    );
}

#[test]
fn cmd_driver_round() {
    let mut q = plan("load cmd:/usr/bin/sleep\nrun sleep {\n  time: 1s\n}");
    let id = node_ids(&q)[0];
    assert!(step(&mut q, id).is_empty());
    assert_eq!(q.node(id).driver().function_name(), "sleep");
}

#[test]
fn returns_flow_into_later_args() {
    let mut q = plan(
        "var out
load echo:/bin/first
load echo:/bin/second
fn a = first {
    args {
        code = 0
        msg = hi
    }
}
fn b = second {
    args {
        got = $(out.code)
    }
}
run a -> out
run b",
    );
    let ids = node_ids(&q);
    assert_eq!(
        q.args(ids[1]),
        Err(ResolveError::UndefinedField {
            base: "out".to_string(),
            field: "code".to_string(),
        })
    );

    let returns = step(&mut q, ids[0]);
    assert_eq!(returns, map(&[("code", "0"), ("msg", "hi")]));
    assert_eq!(q.ast().lookup_field(q.ast().root(), "out", "msg"), Some("hi"));

    let returns = step(&mut q, ids[1]);
    assert_eq!(returns, map(&[("got", "0")]));
}

#[test]
fn returns_without_declared_variable() {
    let mut q = plan(
        "load echo:/bin/first
load echo:/bin/second
fn b = second {
    args {
        v = $(res.code)
    }
}
run first {
    code: 7
}
run first -> res {
    code: 9
}
run b",
    );
    let ids = node_ids(&q);
    step(&mut q, ids[0]);
    assert!(q.args(ids[2]).is_err());
    step(&mut q, ids[1]);
    assert_eq!(q.args(ids[2]).unwrap()["v"], "9");
}

#[test]
fn save_returns_filter() {
    let mut q = plan("var out\nload echo:/bin/first\nrun first -> out {\n  a: 1\n  b: 2\n}");
    let id = node_ids(&q)[0];
    q.load(id).unwrap();
    q.merge_args(id).unwrap();
    let returns = q.invoke(id).unwrap();

    let only_a: &dyn Fn(&str) -> bool = &|field| field == "a";
    assert!(q.save_returns(id, &returns, Some(only_a)));
    let root = q.ast().root();
    assert_eq!(q.ast().lookup_field(root, "out", "a"), Some("1"));
    assert_eq!(q.ast().lookup_field(root, "out", "b"), None);
}

#[test]
fn save_returns_without_target() {
    let mut q = plan("load echo:/bin/first\nrun first {\n  a: 1\n}");
    let id = node_ids(&q)[0];
    assert!(!q.save_returns(id, &map(&[("a", "1")]), None));
}

#[test]
fn every_node_owns_its_driver() {
    let mut q = plan(
        "load echo:/bin/first
fn n = first {
    args {
        k = base
    }
}
run n
run n {
    k: other
}",
    );
    let ids = node_ids(&q);
    assert_eq!(step(&mut q, ids[0]), map(&[("k", "base")]));
    assert_eq!(step(&mut q, ids[1]), map(&[("k", "other")]));
}

#[test]
fn invoke_before_load_fails() {
    let mut q = plan("load echo:/bin/first\nrun first");
    let id = node_ids(&q)[0];
    assert!(matches!(q.invoke(id), Err(DriverError::Invoke(_))));
}

#[test]
fn nodes_can_move_across_threads() {
    fn assert_send<T: Send>() {}
    assert_send::<FuncNode>();
    assert_send::<RunQ>();
}
