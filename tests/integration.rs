//! End-to-end tests for the rekh engine.
//!
//! These exercise the full pipeline: parsing knowledge-file text, routing
//! assertions through taxonomy and rule registration, temporal and
//! context-scoped retrieval, retraction, and proof search over the result.

use std::io::Write;

use rekh::engine::Engine;
use rekh::temporal::{TimeRange, Timestamp};
use rekh::term::Term;

fn engine() -> Engine {
    Engine::with_defaults().unwrap()
}

fn term(engine: &Engine, text: &str) -> Term {
    engine.parse_term(text).unwrap()
}

fn always(engine: &Engine) -> TimeRange {
    TimeRange::always(engine.contexts().root())
}

fn put(engine: &Engine, text: &str) {
    engine
        .assert_term(always(engine), term(engine, text))
        .unwrap();
}

fn ts(text: &str) -> Timestamp {
    Timestamp::parse(text).unwrap()
}

#[test]
fn restricted_assertion_still_lands_and_retrieves() {
    let engine = engine();
    // color is declared to apply to physical objects; ball1 is never put
    // under physical-object, so the assert logs a violation but proceeds.
    put(&engine, "[r1 color physical-object]");
    put(&engine, "[color ball1 red]");

    let root = engine.contexts().root();
    let found = engine.retrieve(Timestamp::At(0), root, &term(&engine, "[color ball1 ?]"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].proposition(), term(&engine, "[color ball1 red]"));
}

#[test]
fn taxonomy_is_directional() {
    let engine = engine();
    put(&engine, "[isa dog mammal]");
    put(&engine, "[isa mammal animal]");

    let dog = engine.intern("dog").unwrap();
    let animal = engine.intern("animal").unwrap();
    assert!(engine.taxonomy().isa(animal, dog));
    assert!(!engine.taxonomy().isa(dog, animal));
}

#[test]
fn rule_and_isa_fact_prove_in_two_levels() {
    let engine = engine();
    put(&engine, "[ifthen [isa ?x dog] [barks ?x]]");
    put(&engine, "[isa rex dog]");

    let root = engine.contexts().root();
    let proofs = engine.prove(
        Timestamp::At(0),
        None,
        root,
        &term(&engine, "[barks rex]"),
        &[],
    );
    assert_eq!(proofs.len(), 1);
    let proof = &proofs[0];
    assert_eq!(proof.fact, term(&engine, "[barks rex]"));
    assert_eq!(proof.reasons.len(), 1);
    assert!(proof.reasons[0].reasons.is_empty());
}

#[test]
fn asserting_twice_changes_nothing() {
    let engine = engine();
    put(&engine, "[likes jim pizza]");
    let before = engine.info();
    put(&engine, "[likes jim pizza]");
    assert_eq!(engine.info(), before);
}

#[test]
fn temporal_bounds_govern_retrieval() {
    let engine = engine();
    let root = engine.contexts().root();
    engine
        .assert_line(
            "@19940101:19950101|[president-of usa clinton]",
            root,
            Timestamp::Na,
        )
        .unwrap();

    let pattern = term(&engine, "[president-of usa ?]");
    assert_eq!(engine.retrieve(ts("19940601"), root, &pattern).len(), 1);
    assert!(engine.retrieve(ts("19990101"), root, &pattern).is_empty());

    // A range query overlapping the interval still finds it.
    let window = TimeRange::parse("19941201:19990101", root).unwrap();
    assert_eq!(engine.retrieve_overlapping(&window, &pattern).len(), 1);
}

#[test]
fn retraction_respects_context_boundaries() {
    let engine = engine();
    let root = engine.contexts().root();
    put(&engine, "[likes jim pizza]");

    let child = engine.sprout(root).unwrap();
    let sibling = engine.sprout(root).unwrap();
    let pattern = term(&engine, "[likes jim pizza]");

    let stopped = engine.retract(ts("19940101"), child, &pattern);
    assert_eq!(stopped.len(), 1);

    // Gone from the retracting context after the stop time.
    assert!(engine.retrieve(ts("19950101"), child, &pattern).is_empty());
    // Still visible before it.
    assert_eq!(engine.retrieve(ts("19930101"), child, &pattern).len(), 1);
    // The sibling and the root never notice.
    assert_eq!(engine.retrieve(ts("19950101"), sibling, &pattern).len(), 1);
    assert_eq!(engine.retrieve(ts("19950101"), root, &pattern).len(), 1);
}

#[test]
fn facts_flow_down_contexts_not_up() {
    let engine = engine();
    let root = engine.contexts().root();
    put(&engine, "[likes jim pizza]");

    let child = engine.sprout(root).unwrap();
    engine
        .assert_term(TimeRange::always(child), term(&engine, "[likes jim sushi]"))
        .unwrap();

    let anything = term(&engine, "[likes jim ?]");
    assert_eq!(engine.retrieve(Timestamp::At(0), child, &anything).len(), 2);
    assert_eq!(engine.retrieve(Timestamp::At(0), root, &anything).len(), 1);
}

#[test]
fn rule_and_fact_weights_multiply_into_scores() {
    let engine = engine();
    engine
        .assert_weighted(always(&engine), term(&engine, "[wet grass]"), 0.9)
        .unwrap();
    put(&engine, "[ifthen [wet grass] [rained overnight] 0.8]");

    let proofs = engine.prove(
        Timestamp::At(0),
        None,
        engine.contexts().root(),
        &term(&engine, "[rained overnight]"),
        &[],
    );
    assert_eq!(proofs.len(), 1);
    assert!((proofs[0].score - 0.72).abs() < 1e-9);
}

#[test]
fn adding_unrelated_knowledge_keeps_existing_proofs() {
    let engine = engine();
    let root = engine.contexts().root();
    put(&engine, "[likes jim pizza]");
    let goal = term(&engine, "[likes jim pizza]");
    let before = engine.prove(Timestamp::At(0), None, root, &goal, &[]);
    assert_eq!(before.len(), 1);

    put(&engine, "[orbits moon earth]");
    put(&engine, "[ifthen [made-of moon cheese] [edible moon]]");
    let after = engine.prove(Timestamp::At(0), None, root, &goal, &[]);
    assert_eq!(after.len(), before.len());
    assert_eq!(after[0].score, before[0].score);
}

#[test]
fn loader_feeds_taxonomy_rules_and_facts() {
    let engine = engine();
    let mut file = tempfile::Builder::new().suffix(".gz").tempfile().unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(
            b"; zoo knowledge\n\
              [isa dog mammal]\n\
              [isa rex dog]\n\
              [ifthen [isa ?x dog] [barks ?x]]\n\
              @19940101:inf|[lives-in rex zoo1]\n",
        )
        .unwrap();
    file.write_all(&encoder.finish().unwrap()).unwrap();

    let stats = engine.load(file.path()).unwrap();
    assert_eq!(stats.facts, 4);
    assert_eq!(stats.isa_edges, 2);
    assert_eq!(stats.rules, 1);
    assert_eq!(stats.errors, 0);

    let root = engine.contexts().root();
    let barks = engine.query(Timestamp::At(0), None, root, &term(&engine, "[barks rex]"));
    assert_eq!(barks, vec![term(&engine, "[barks rex]")]);
    assert_eq!(
        engine
            .retrieve(ts("19990101"), root, &term(&engine, "[lives-in rex ?]"))
            .len(),
        1
    );
}

#[test]
fn enum_and_graded_attributes_resolve_through_the_store() {
    let engine = engine();
    let root = engine.contexts().root();
    put(&engine, "[isa jim human]");
    put(&engine, "[isa honest personality-trait]");
    put(&engine, "[honest human]");
    put(&engine, "[tall jim 0.8]");
    put(&engine, "[tall jim 0.6]");

    let store = engine.store();
    let trait_class = engine.intern("personality-trait").unwrap();
    let unknown = engine.intern("unknown-trait").unwrap();
    let jim = term(&engine, "jim");

    // jim carries no trait directly; the class-level default on human wins.
    let value = store.enum_value(Timestamp::At(0), root, trait_class, &jim, unknown);
    assert_eq!(value, engine.intern("honest").unwrap());

    let tall = engine.intern("tall").unwrap();
    let graded = store
        .attribute_value(Timestamp::At(0), root, tall, &jim)
        .unwrap();
    assert!((graded - 0.7).abs() < 1e-9);
}

#[test]
fn genitive_materializes_declared_parts() {
    let engine = engine();
    let root = engine.contexts().root();
    put(&engine, "[isa house1 house]");
    put(&engine, "[part-of door house]");

    let store = engine.store();
    let door = engine.intern("door").unwrap();
    let house1 = engine.intern("house1").unwrap();

    let part = store
        .retrieve_part(Timestamp::At(0), root, door, house1)
        .expect("a door should be materialized");
    assert!(engine.taxonomy().isa(door, part));

    // The materialized part is remembered, not re-created.
    let again = store.retrieve_part(Timestamp::At(0), root, door, house1);
    assert_eq!(again, Some(part));

    let of_house = store.genitive_retrieve(Timestamp::At(0), root, door, house1);
    assert_eq!(of_house, vec![Term::Symbol(part)]);
}

#[test]
fn hooks_observe_engine_assertions() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let engine = engine();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    engine.on_assert(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    put(&engine, "[likes jim pizza]");
    put(&engine, "[likes jim pizza]"); // duplicate, no hook
    put(&engine, "[likes jim sushi]");
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}
