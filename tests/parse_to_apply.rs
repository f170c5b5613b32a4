//! End-to-end: operator text through the keyword classifier and gazetteer
//! tagger, into a proposed diff, applied against the demo directory.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rule_expr::Field;
use serde_json::json;

use dl_intent::nlp::{
    assemble_from_directory, intents, GazetteerSlotTagger, KeywordIntentClassifier,
};
use dl_intent::rules::SAVED_FILTERS;
use dl_intent::{
    Action, ChangeService, DirectoryStore, DlConfig, InMemoryDirectoryStore, IntentSlotParser,
    ProposeRequest, RuleType, SynonymSeed,
};

// =============================================================================
// Fixtures
// =============================================================================

async fn parser_for(store: &InMemoryDirectoryStore) -> IntentSlotParser {
    let seed = SynonymSeed::builtin().unwrap();
    let table = assemble_from_directory(store, &seed).await;
    let groups = store.list_groups().await.unwrap();
    let tagger = GazetteerSlotTagger::from_vocabulary(
        groups.iter().map(|group| group.name.as_str()),
        &table,
        SAVED_FILTERS.iter().map(|filter| filter.name),
    );
    IntentSlotParser::new(Arc::new(KeywordIntentClassifier), Arc::new(tagger), table)
}

async fn setup() -> (Arc<InMemoryDirectoryStore>, IntentSlotParser, ChangeService) {
    let store = Arc::new(InMemoryDirectoryStore::demo());
    let parser = parser_for(&store).await;
    let service = ChangeService::new(store.clone(), DlConfig::default());
    (store, parser, service)
}

// =============================================================================
// Membership rules
// =============================================================================

#[tokio::test]
async fn test_location_rule_end_to_end() {
    let (store, parser, service) = setup().await;

    let parsed = parser.parse("add Houston HQ to Corporate_IT").unwrap();
    assert_eq!(parsed.intent, intents::ADD_RULE);
    assert_eq!(parsed.slots.group.as_deref(), Some("Corporate_IT"));
    assert_eq!(parsed.slots.location.as_deref(), Some("Houston HQ"));

    let request = ProposeRequest::from_parse(&parsed, None).unwrap();
    assert_eq!(request.rule_type.as_deref(), Some("location"));

    let proposal = service.propose(&request).await.unwrap();
    assert_eq!(proposal.rule_type, RuleType::Location);
    assert_eq!(proposal.match_count, 3);

    let applied = service.apply(&proposal.id, "ops").await.unwrap();
    assert!(applied.ok);
    assert_eq!(applied.applied, proposal.match_count);
    assert_eq!(applied.summary.added.count, 3);
    assert_eq!(applied.summary.removed.count, 0);
    assert_eq!(applied.summary.rule.value.as_deref(), Some("Houston HQ"));

    let memberships = store.list_memberships("g_corp_it").await.unwrap();
    assert_eq!(memberships.len(), 3);
    assert!(memberships
        .iter()
        .all(|m| m.rule_type == RuleType::Location && m.flag == "Include"));

    let audit = service.audit_log(10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].id, applied.audit_id);
    assert_eq!(audit[0].op, "ADD");
    assert_eq!(audit[0].actor, "ops");
}

#[tokio::test]
async fn test_saved_filter_phrase_end_to_end() {
    let (store, parser, service) = setup().await;

    let parsed = parser
        .parse("add contractors ending soon to MSG_Production_East")
        .unwrap();
    assert_eq!(parsed.slots.rule_type, Some(RuleType::SavedFilter));
    assert_eq!(
        parsed.slots.rule_value.as_deref(),
        Some("Contractors Ending Soon")
    );

    let request = ProposeRequest::from_parse(&parsed, None).unwrap();
    let proposal = service.propose(&request).await.unwrap();
    assert_eq!(proposal.group_id, "g_msg_prod_east");
    assert_eq!(proposal.match_count, 1);

    service.apply(&proposal.id, "ops").await.unwrap();
    let sam = store
        .find_membership("u_temp", "g_msg_prod_east")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sam.id, "m1");
    assert_eq!(sam.rule_type, RuleType::SavedFilter);
    assert_eq!(sam.rule_value.as_deref(), Some("Contractors Ending Soon"));
}

#[tokio::test]
async fn test_manager_removal_with_nothing_to_remove() {
    let (store, parser, service) = setup().await;

    let parsed = parser
        .parse("remove everyone reporting to Maria Gonzales")
        .unwrap();
    assert_eq!(parsed.intent, intents::REMOVE_RULE);
    assert_eq!(parsed.slots.rule_type, Some(RuleType::Manager));

    let request = ProposeRequest::from_parse(&parsed, Some("DRILL_Permian")).unwrap();
    let proposal = service.propose(&request).await.unwrap();
    assert_eq!(proposal.action, Action::Remove);
    assert_eq!(proposal.match_count, 2);

    let applied = service.apply(&proposal.id, "ops").await.unwrap();
    assert!(applied.ok);
    assert_eq!(applied.applied, 0);
    assert_eq!(applied.removed, 0);
    assert_eq!(store.list_memberships("g_drill_permian").await.unwrap().len(), 1);
}

// =============================================================================
// Employee records
// =============================================================================

#[tokio::test]
async fn test_deactivate_employee_end_to_end() {
    let (store, parser, service) = setup().await;

    let parsed = parser.parse("deactivate Frank Patel").unwrap();
    assert_eq!(parsed.intent, intents::EMPLOYEE_RECORD_SET);

    let request = ProposeRequest::from_parse(&parsed, Some("Corporate_IT")).unwrap();
    let proposal = service.propose(&request).await.unwrap();
    assert_eq!(proposal.rule_type, RuleType::EmployeeRecord);
    assert_eq!(proposal.rule_value.as_deref(), Some("Frank Patel"));
    assert_eq!(
        serde_json::to_value(&proposal.record_changes).unwrap()["set"],
        json!({ "active": false })
    );

    let applied = service.apply(&proposal.id, "hr").await.unwrap();
    assert_eq!(applied.applied, 1);
    let frank = store.find_user("u_frank").await.unwrap().unwrap();
    assert_eq!(frank.active, Some(false));
}

// =============================================================================
// Synonym snapshots
// =============================================================================

#[tokio::test]
async fn test_seed_fallback_when_directory_values_fail() {
    let store = InMemoryDirectoryStore::demo();
    store.faults().distinct_values.store(true, Ordering::SeqCst);

    let parser = parser_for(&store).await;
    let parsed = parser.parse("add houston office to Corporate_IT").unwrap();
    assert_eq!(parsed.slots.location.as_deref(), Some("Houston HQ"));
    assert_eq!(parsed.slots.group.as_deref(), Some("Corporate_IT"));
}

#[tokio::test]
async fn test_refresh_picks_up_new_directory_values() {
    let store = InMemoryDirectoryStore::demo();
    let parser = parser_for(&store).await;

    let before = parser.parse("remove Denver Hub from Corporate_IT").unwrap();
    assert_eq!(before.slots.rule_type, None);

    let set = BTreeMap::from([(Field::Location, json!("Denver Hub"))]);
    store.update_user_fields("u_erika", &set, &[]).await.unwrap();
    let seed = SynonymSeed::builtin().unwrap();
    let version = parser.refresh_from_directory(&store, &seed).await;
    assert_eq!(parser.synonyms().version(), version);

    let after = parser.parse("remove Denver Hub from Corporate_IT").unwrap();
    assert_eq!(after.intent, intents::REMOVE_RULE);
    assert_eq!(after.slots.rule_type, Some(RuleType::Location));
    assert_eq!(after.slots.rule_value.as_deref(), Some("Denver Hub"));
}
