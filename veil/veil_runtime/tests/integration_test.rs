//! Integration tests for veil_runtime.

use std::cell::RefCell;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use veil_runtime::*;

// Initialize tracing for tests
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn principal(name: &str) -> Value {
    Value::from(name)
}

/// A runtime with a label visible only to `alice`, and a secret that is 42
/// for her and 0 for everyone else.
fn alice_secret(rt: &Runtime) -> (Label, Expr) {
    let x = rt.mk_label(Some("x"));
    rt.restrict(&x, |ctx| Expr::from(ctx == &Value::from("alice")))
        .unwrap();
    let secret = rt.mk_sensitive(&x, 42, 0);
    (x, secret)
}

/// A cell whose writes are only observable when `bob` wrote them.
fn bob_cell(initial: i64) -> ProtectedRef {
    ProtectedRef::new(initial)
        .with_output_policy(|_, writer, _| Expr::from(writer == &Value::from("bob")))
}

#[test]
fn test_collapse_law() {
    init_tracing();
    let rt = Runtime::default();
    let l = rt.mk_label(Some("l"));
    let m = rt.mk_label(Some("m"));
    rt.restrict(&m, |ctx| Expr::from(ctx == &Value::Int(1))).unwrap();

    let candidates = vec![
        Expr::from(5),
        Expr::from("text"),
        Expr::list(vec![Expr::from(1), Expr::from(2)]),
        Expr::facet(&m, Expr::from(1), Expr::from(2)),
    ];
    for x in candidates {
        let collapsed = Expr::facet(&l, x.clone(), x.clone());
        assert!(collapsed.ptr_eq(&x));
        for ctx in [Value::Int(0), Value::Int(1)] {
            assert_eq!(
                rt.concretize(&ctx, &collapsed).unwrap(),
                rt.concretize(&ctx, &x).unwrap()
            );
        }
    }

    // Equal constants collapse even when built separately.
    let separate = Expr::facet(&l, Expr::from(7), Expr::from(7));
    assert_eq!(separate.as_const(), Some(&Value::Int(7)));
}

#[test]
fn test_disclosure_round_trip() {
    init_tracing();
    let rt = Runtime::default();
    let x = rt.mk_label(Some("x"));
    rt.restrict(&x, |ctx| Expr::from(ctx == &Value::Int(42))).unwrap();
    let s = rt.mk_sensitive(&x, 42, 0);

    assert_eq!(rt.concretize(&Value::Int(42), &s).unwrap(), Value::Int(42));
    assert_eq!(rt.concretize(&Value::Int(0), &s).unwrap(), Value::Int(0));
}

#[test]
fn test_boolean_algebra() {
    init_tracing();
    let mut rt = Runtime::default();
    let a = rt.mk_label(Some("a"));
    let b = rt.mk_label(Some("b"));
    // Context k discloses `a` when bit 0 is set and `b` when bit 1 is set.
    rt.restrict(&a, |ctx| Expr::from(ctx.as_int().map_or(false, |k| k & 1 == 1)))
        .unwrap();
    rt.restrict(&b, |ctx| Expr::from(ctx.as_int().map_or(false, |k| k & 2 == 2)))
        .unwrap();

    let mut checked = 0;
    for bits in 0..16u8 {
        let (lh, ll, rh, rl) = (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0);
        let l = Expr::facet(&a, Expr::from(lh), Expr::from(ll));
        let r = Expr::facet(&b, Expr::from(rh), Expr::from(rl));
        let and = rt.and(&l, &r).unwrap();
        let or = rt.or(&l, &r).unwrap();
        let not = rt.not(&l).unwrap();

        for k in 0..4i64 {
            let ctx = Value::Int(k);
            let left = if k & 1 == 1 { lh } else { ll };
            let right = if k & 2 == 2 { rh } else { rl };
            assert_eq!(rt.concretize(&ctx, &and).unwrap(), Value::Bool(left && right));
            assert_eq!(rt.concretize(&ctx, &or).unwrap(), Value::Bool(left || right));
            assert_eq!(rt.concretize(&ctx, &not).unwrap(), Value::Bool(!left));
            checked += 1;
        }
    }
    info!("Checked {} boolean combinations", checked);
    assert_eq!(checked, 64);
}

#[test]
fn test_write_enforcement() {
    init_tracing();
    let mut rt = Runtime::default();
    let (alice, bob) = (principal("alice"), principal("bob"));
    let mut cell = bob_cell(7);

    cell.update(&mut rt, &alice, &alice, &Expr::from(42)).unwrap();
    for viewer in [&alice, &bob, &Value::Unit] {
        assert_eq!(rt.concretize(viewer, cell.value()).unwrap(), Value::Int(7));
    }

    cell.update(&mut rt, &bob, &bob, &Expr::from(42)).unwrap();
    for viewer in [&alice, &bob, &Value::Unit] {
        assert_eq!(rt.concretize(viewer, cell.value()).unwrap(), Value::Int(42));
    }
}

#[test]
fn test_no_leak_through_written_value() {
    init_tracing();
    let mut rt = Runtime::default();
    let (alice, bob) = (principal("alice"), principal("bob"));
    let (_, secret) = alice_secret(&rt);
    let mut y = bob_cell(1);

    // 2 if secret == 42 else 3, without resolving the secret.
    let is_42 = secret.equals(&Expr::from(42)).unwrap();
    let derived = rt
        .branch(&is_42, |_| Ok(Expr::from(2)), |_| Ok(Expr::from(3)))
        .unwrap();
    assert!(derived.is_faceted());

    y.update(&mut rt, &bob, &bob, &derived).unwrap();
    assert_eq!(rt.concretize(&bob, y.value()).unwrap(), Value::Int(3));
    assert_eq!(rt.concretize(&alice, y.value()).unwrap(), Value::Int(2));
}

#[test]
fn test_no_leak_through_control_flow() {
    init_tracing();
    let mut rt = Runtime::default();
    let (alice, bob) = (principal("alice"), principal("bob"));
    let (_, secret) = alice_secret(&rt);
    let y = RefCell::new(bob_cell(1));

    let is_42 = secret.equals(&Expr::from(42)).unwrap();
    rt.branch(
        &is_42,
        |rt| {
            y.borrow_mut().update(rt, &bob, &bob, &Expr::from(2))?;
            Ok(Expr::unit())
        },
        |_| Ok(Expr::unit()),
    )
    .unwrap();

    let y = y.into_inner();
    // bob cannot see x, so on his branch the secret is 0 and the write
    // never happened.
    assert_eq!(rt.concretize(&bob, y.value()).unwrap(), Value::Int(1));
    assert_eq!(rt.concretize(&alice, y.value()).unwrap(), Value::Int(2));
}

#[test]
fn test_control_flow_follows_viewer_branch() {
    init_tracing();
    let mut rt = Runtime::default();
    let (alice, bob) = (principal("alice"), principal("bob"));
    let (_, secret) = alice_secret(&rt);
    let y = RefCell::new(bob_cell(1));

    // Taken on the low branch of x: the one bob observes.
    let is_zero = secret.equals(&Expr::from(0)).unwrap();
    rt.branch(
        &is_zero,
        |rt| {
            y.borrow_mut().update(rt, &bob, &bob, &Expr::from(2))?;
            Ok(Expr::unit())
        },
        |_| Ok(Expr::unit()),
    )
    .unwrap();

    let y = y.into_inner();
    assert_eq!(rt.concretize(&bob, y.value()).unwrap(), Value::Int(2));

    // alice sees the secret, so the write is off her branch, even when the
    // written cell is resolved before the secret itself.
    let both = Expr::list(vec![y.value().clone(), secret.clone()]);
    let seen = rt.concretize(&alice, &both).unwrap();
    let elements = seen.as_list().unwrap();
    assert_eq!(elements[0].as_const(), Some(&Value::Int(1)));
    assert_eq!(elements[1].as_const(), Some(&Value::Int(42)));
}

#[test]
fn test_untracked_implicit_flow() {
    init_tracing();
    let config = RuntimeConfig::default().with_implicit_flow_tracking(false);
    let mut rt = Runtime::new(config);
    let bob = principal("bob");
    let (_, secret) = alice_secret(&rt);
    let y = RefCell::new(bob_cell(1));

    let is_42 = secret.equals(&Expr::from(42)).unwrap();
    rt.branch(
        &is_42,
        |rt| {
            y.borrow_mut().update(rt, &bob, &bob, &Expr::from(2))?;
            Ok(Expr::unit())
        },
        |_| Ok(Expr::unit()),
    )
    .unwrap();

    // Without path labels the write is visible to bob.
    assert_eq!(
        rt.concretize(&bob, y.into_inner().value()).unwrap(),
        Value::Int(2)
    );
}

#[test]
fn test_determinism() {
    init_tracing();
    let mut rt = Runtime::default();
    let (_, secret) = alice_secret(&rt);
    let doubled = secret.plus(&secret).unwrap();
    let cond = doubled.equals(&Expr::from(84)).unwrap();
    let expr = rt
        .branch(&cond, |_| Ok(Expr::from("yes")), |_| Ok(Expr::from("no")))
        .unwrap();

    for viewer in [principal("alice"), principal("bob")] {
        let first = rt.concretize(&viewer, &expr).unwrap();
        for _ in 0..10 {
            assert_eq!(rt.concretize(&viewer, &expr).unwrap(), first);
        }
    }
}

#[test]
fn test_resolution_consistency() {
    init_tracing();
    let rt = Runtime::default();
    let x = rt.mk_label(Some("x"));
    let y = rt.mk_label(Some("y"));
    // y is only disclosed when x is not.
    let x_for_y = x.clone();
    rt.restrict(&y, move |_| Expr::unary(veil_facet::UnaryOp::Not, Expr::var(&x_for_y)))
        .unwrap();

    let mut session = rt.session(Value::Unit);
    let x_value = session.resolve(&x).unwrap();
    let via_facet = session
        .concretize(&Expr::facet(&x, Expr::from(true), Expr::from(false)))
        .unwrap();
    let via_var = session.concretize(&Expr::var(&x)).unwrap();
    let y_value = session.concretize(&Expr::var(&y)).unwrap();

    assert_eq!(via_facet, Value::Bool(x_value));
    assert_eq!(via_var, Value::Bool(x_value));
    assert_eq!(y_value, Value::Bool(!x_value));
    assert_eq!(session.resolved().get(&x), Some(&x_value));
}

#[test]
fn test_records_through_branches() {
    init_tracing();
    let mut rt = Runtime::default();
    let mut table = FieldPolicyTable::new();
    table
        .register(
            "Account",
            "balance",
            FieldPolicy::new(|_, viewer| Expr::from(viewer == &Value::from("alice")))
                .with_low(|_| Expr::from(-1)),
        )
        .unwrap();
    let (_, secret) = alice_secret(&rt);
    let record = RefCell::new(FacetedRecord::with_key("Account", "acct-1"));
    record
        .borrow_mut()
        .set(&mut rt, &table, &Value::Unit, "balance", 100)
        .unwrap();

    let is_42 = secret.equals(&Expr::from(42)).unwrap();
    rt.branch(
        &is_42,
        |rt| {
            record
                .borrow_mut()
                .set(rt, &table, &Value::Unit, "balance", 200)?;
            Ok(Expr::unit())
        },
        |_| Ok(Expr::unit()),
    )
    .unwrap();

    let record = record.into_inner();
    assert_eq!(
        record.read(&rt, &principal("alice"), "balance").unwrap(),
        Value::Int(200)
    );
    assert_eq!(
        record.read(&rt, &principal("bob"), "balance").unwrap(),
        Value::Int(-1)
    );
}
