//! # Ingestion Tier Tests (T0-T3)
//!
//! End-to-end checks of the ingestion engine, tier by tier.
//!
//! ## Tiers
//! - T0: Preprocessing
//! - T1: Idempotent Loading
//! - T2: Bulk Deletion
//! - T3: Mapping Search

use oxo_core::preprocess::metadata::{Metadata, extract};
use oxo_core::primitives::columns::*;
use oxo_core::{
    EntityKind, Graph, GraphStore, IngestPlan, Orchestrator, OxoError, PipelineMode,
    PreprocessOptions, RedbGraph, Scope, Session, Table, UpsertLoader, preprocess_str,
    search_mappings,
};

const MONDO_NS: &str = "http://purl.obolibrary.org/obo/MONDO_";

const RAW: &str = "#curie_map:\n\
#  MONDO: http://purl.obolibrary.org/obo/MONDO_\n\
#  DOID: http://purl.obolibrary.org/obo/DOID_\n\
#mapping_date: 2023-01-15\n\
subject_id\tsubject_label\tsubject_category\tsubject_source\tpredicate_id\t\
object_id\tobject_label\tobject_category\tobject_source\tmatch_type\tmatch_string\n\
MONDO:0005015\tdiabetes mellitus\tdisease\tMONDO\towl:equivalentClass\t\
DOID:9351\tdiabetes mellitus\tdisease\tDOID\tLexical\tdiabetes mellitus\n\
MONDO:0004979\tasthma\t\tMONDO\tskos:closeMatch\t\
DOID:2841\tasthma\t\tDOID\tLexical\t\n\
DOID:2841\tasthma\t\tDOID\towl:equivalentClass\t\
HP:0002099\tAsthma\t\tHP\tLexical\t\n";

fn normalized() -> Table {
    preprocess_str(RAW, &PreprocessOptions::default())
        .expect("preprocess")
        .table
}

fn load(store: &mut dyn GraphStore, table: &Table) {
    let loader = UpsertLoader::default();
    loader.load_datasources(store, table).expect("datasources");
    loader.load_terms(store, table).expect("terms");
    loader.load_mappings(store, table).expect("mappings");
}

fn counts(store: &dyn GraphStore) -> Vec<usize> {
    EntityKind::WIPE_ORDER
        .iter()
        .map(|kind| store.count(*kind).expect("count"))
        .collect()
}

// =============================================================================
// TIER T0: PREPROCESSING
// =============================================================================

mod t0_preprocessing {
    use super::*;

    /// T0.1: The embedded header parses and no metadata line becomes a row.
    #[test]
    fn metadata_round_trip() {
        let text = format!("#curie_map:\n#  MONDO: {}\nsubject_id\tobject_id\n", MONDO_NS);

        let extracted = extract(&text).expect("extract");
        let expected = Metadata::parse_yaml(&format!("curie_map:\n  MONDO: {}\n", MONDO_NS))
            .expect("expected");

        assert_eq!(extracted.metadata, expected);
        let table = Table::from_tsv(extracted.body, 3).expect("table");
        assert!(table.is_empty());
    }

    /// T0.2: Mapped prefixes expand, unmapped ones stay unset.
    #[test]
    fn curie_expansion() {
        let table = normalized();

        assert_eq!(
            table.rows()[0].get(SUBJECT_URI),
            Some("http://purl.obolibrary.org/obo/MONDO_0005015")
        );
        assert_eq!(
            table.rows()[0].get(OBJECT_URI),
            Some("http://purl.obolibrary.org/obo/DOID_9351")
        );
        assert_eq!(table.rows()[2].get(OBJECT_URI), None);
    }

    /// T0.3: Only owl:equivalentClass is classified.
    #[test]
    fn scope_classification() {
        let table = normalized();

        assert_eq!(table.rows()[0].get(SCOPE), Some("EXACT"));
        assert_eq!(table.rows()[1].get(SCOPE), None);
    }

    /// T0.4: Metadata date is applied to every row.
    #[test]
    fn mapping_date_applied() {
        let table = normalized();
        assert!(
            table
                .rows()
                .iter()
                .all(|row| row.get(MAPPING_DATE) == Some("2023-01-15"))
        );
    }

    /// T0.5: Expand-only leaves derived columns out.
    #[test]
    fn expand_only_mode() {
        let options = PreprocessOptions {
            mode: PipelineMode::ExpandOnly,
            ..PreprocessOptions::default()
        };
        let table = preprocess_str(RAW, &options).expect("preprocess").table;

        assert!(table.has_column(SUBJECT_URI));
        assert!(!table.has_column(DATASOURCE));
        assert!(!table.has_column(SCOPE));
    }

    /// T0.6: A malformed curie fails with its file line.
    #[test]
    fn malformed_curie_fails_fast() {
        let raw = "#mapping_date: 2023-01-15\n\
subject_id\tsubject_source\tpredicate_id\tobject_id\n\
MONDO:1\tMONDO\towl:equivalentClass\tDOID:1\n\
nocolon\tMONDO\towl:equivalentClass\tDOID:2\n";

        let err = preprocess_str(raw, &PreprocessOptions::default()).expect_err("malformed");

        assert!(matches!(err, OxoError::MalformedRow { line: 4, .. }));
    }
}

// =============================================================================
// TIER T1: IDEMPOTENT LOADING
// =============================================================================

mod t1_loading {
    use super::*;

    /// T1.1: Loading twice yields identical counts.
    #[test]
    fn idempotent_in_memory() {
        let table = normalized();
        let mut graph = Graph::new();

        load(&mut graph, &table);
        let first = counts(&graph);
        load(&mut graph, &table);

        assert_eq!(first, counts(&graph));
        assert_eq!(first, vec![3, 5, 5, 3]);
    }

    /// T1.2: The redb backend matches the in-memory backend.
    #[test]
    fn redb_matches_in_memory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let table = normalized();
        let mut graph = Graph::new();
        let mut redb = RedbGraph::open(temp.path().join("oxo.redb")).expect("open");

        load(&mut graph, &table);
        load(&mut redb, &table);
        load(&mut redb, &table);

        assert_eq!(counts(&graph), counts(&redb));
        assert_eq!(
            graph.term("DOID:9351").expect("lookup"),
            redb.term("DOID:9351").expect("lookup")
        );
    }

    /// T1.3: Reloading with a blank label resets the stored value.
    #[test]
    fn null_reset() {
        let mut graph = Graph::new();
        load(&mut graph, &normalized());
        assert!(graph.term("MONDO:0004979").expect("lookup").expect("term").label.is_some());

        let blanked = RAW.replace("MONDO:0004979\tasthma\t", "MONDO:0004979\t \t");
        let table = preprocess_str(&blanked, &PreprocessOptions::default())
            .expect("preprocess")
            .table;
        UpsertLoader::default()
            .load_terms(&mut graph, &table)
            .expect("terms");

        let term = graph.term("MONDO:0004979").expect("lookup").expect("term");
        assert_eq!(term.label, None);
    }

    /// T1.4: Mappings loaded before terms create no edges.
    #[test]
    fn dependency_ordering() {
        let table = normalized();
        let mut graph = Graph::new();

        let report = UpsertLoader::default()
            .load_mappings(&mut graph, &table)
            .expect("mappings");

        assert_eq!(report.merges.unmatched, 3);
        assert_eq!(graph.count(EntityKind::Mapping).expect("count"), 0);
    }

    /// T1.5: Mapping edges carry every normalized attribute.
    #[test]
    fn mapping_attributes_loaded() {
        let mut graph = Graph::new();
        load(&mut graph, &normalized());

        let mapping = graph
            .mappings_of("MONDO:0005015")
            .expect("lookup")
            .pop()
            .expect("mapping");
        assert_eq!(mapping.attributes.predicate.as_deref(), Some("owl:equivalentClass"));
        assert_eq!(mapping.attributes.source_prefix.as_deref(), Some("MONDO"));
        assert_eq!(mapping.attributes.date.as_deref(), Some("2023-01-15"));
        assert_eq!(mapping.scope(), Some(Scope::Exact));
        assert_eq!(mapping.match_string.as_deref(), Some("diabetes mellitus"));
        assert!(mapping.attributes.datasource.is_some());
    }
}

// =============================================================================
// TIER T2: BULK DELETION
// =============================================================================

mod t2_deletion {
    use super::*;
    use oxo_core::{BatchLimits, WipeController};

    /// T2.1: Total deleted equals the initial count and the graph ends empty.
    #[test]
    fn wipe_terminates_on_redb() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut redb = RedbGraph::open(temp.path().join("oxo.redb")).expect("open");
        load(&mut redb, &normalized());
        let before: usize = counts(&redb).iter().sum();

        let report = WipeController::with_limits(BatchLimits::uniform(2))
            .wipe(&mut redb)
            .expect("wipe");

        assert_eq!(report.total(), before);
        assert_eq!(counts(&redb), vec![0, 0, 0, 0]);
    }

    /// T2.2: Wipe then reload through the orchestrator is stable.
    #[test]
    fn orchestrated_wipe_and_reload() {
        let temp = tempfile::tempdir().expect("temp dir");
        let tsv = temp.path().join("normalized.tsv");
        normalized().write_tsv(&tsv).expect("write");
        let plan = IngestPlan {
            wipe: true,
            datasources: Some(tsv.clone()),
            terms: Some(tsv.clone()),
            mappings: Some(tsv),
            ..IngestPlan::default()
        };
        let mut session =
            Session::connect(&format!("redb://{}", temp.path().join("oxo.redb").display()))
                .expect("session");
        let orchestrator = Orchestrator::default();

        orchestrator.run(&plan, Some(session.store_mut())).expect("first");
        let first = counts(session.store());
        orchestrator.run(&plan, Some(session.store_mut())).expect("second");

        assert_eq!(first, counts(session.store()));
    }
}

// =============================================================================
// TIER T3: MAPPING SEARCH
// =============================================================================

mod t3_search {
    use super::*;

    /// T3.1: Direct mappings at distance 1, two-hop at distance 2.
    #[test]
    fn distances() {
        let mut graph = Graph::new();
        load(&mut graph, &normalized());

        let direct = search_mappings(&graph, "MONDO:0004979", 1).expect("search");
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].curie, "DOID:2841");
        assert_eq!(direct[0].target_prefix, "DOID");

        let two_hop = search_mappings(&graph, "MONDO:0004979", 2).expect("search");
        let hp = two_hop
            .iter()
            .find(|r| r.curie == "HP:0002099")
            .expect("HP term");
        assert_eq!(hp.distance, 2);
        assert_eq!(hp.label.as_deref(), Some("Asthma"));
        assert_eq!(hp.scope, None);
    }

    /// T3.2: Nothing beyond the bound.
    #[test]
    fn bound_respected() {
        let mut graph = Graph::new();
        load(&mut graph, &normalized());

        let results = search_mappings(&graph, "MONDO:0004979", 1).expect("search");
        assert!(results.iter().all(|r| r.curie != "HP:0002099"));
    }
}
