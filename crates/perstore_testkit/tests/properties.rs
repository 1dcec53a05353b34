//! Property tests over the public API vocabulary and the session
//! engine.

use perstore_api::{CacheMode, CacheRetrieveMode, CacheStoreMode, FlushMode, LockMode};
use perstore_core::Entity;
use perstore_testkit::fixtures::{scenarios, TestFactory, TestUser};
use perstore_testkit::generators::{
    cache_mode_strategy, lock_mode_strategy, timeout_strategy, user_strategy,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn lock_mode_comparison_follows_levels(
        a in lock_mode_strategy(),
        b in lock_mode_strategy(),
    ) {
        prop_assert_eq!(a.greater_than(b), a.level() > b.level());
        prop_assert_eq!(a.less_than(b), a.level() < b.level());
        // never both
        prop_assert!(!(a.greater_than(b) && a.less_than(b)));
    }

    #[test]
    fn lock_mode_external_form_round_trips(mode in lock_mode_strategy()) {
        prop_assert_eq!(LockMode::from_external_form(mode.external_form()), Some(mode));
    }

    #[test]
    fn external_form_is_case_insensitive(mode in lock_mode_strategy()) {
        let upper = mode.external_form().to_uppercase();
        prop_assert_eq!(LockMode::from_external_form(&upper), Some(mode));
    }

    #[test]
    fn cache_mode_decomposes_and_recombines(mode in cache_mode_strategy()) {
        let recombined = CacheMode::from_modes(mode.retrieve_mode(), mode.store_mode());
        prop_assert_eq!(recombined, mode);
    }

    #[test]
    fn refresh_store_mode_always_wins(retrieve in prop::sample::select(vec![
        CacheRetrieveMode::Use,
        CacheRetrieveMode::Bypass,
    ])) {
        prop_assert_eq!(
            CacheMode::from_modes(retrieve, CacheStoreMode::Refresh),
            CacheMode::Refresh
        );
    }

    #[test]
    fn timeouts_have_a_duration_iff_real(timeout in timeout_strategy()) {
        prop_assert_eq!(timeout.as_duration().is_some(), timeout.is_real());
    }

    #[test]
    fn flush_mode_ordering_is_total(
        a in prop::sample::select(FlushMode::ALL.to_vec()),
        b in prop::sample::select(FlushMode::ALL.to_vec()),
    ) {
        if a != b {
            prop_assert_ne!(a.less_than(b), b.less_than(a));
        } else {
            prop_assert!(!a.less_than(b));
        }
    }

    #[test]
    fn entities_round_trip_through_a_session(user in user_strategy()) {
        let test = TestFactory::memory();
        let mut session = test.open_session().unwrap();
        session.persist(&user).unwrap();
        session.commit().unwrap();

        let mut session = test.open_session().unwrap();
        let found: TestUser = session.find(user.id).unwrap().unwrap();
        prop_assert_eq!(found, user);
    }

    #[test]
    fn natural_id_lookup_matches_direct_lookup(user in user_strategy()) {
        let test = TestFactory::memory();
        let mut session = test.open_session().unwrap();
        session.persist(&user).unwrap();
        session.commit().unwrap();

        let mut session = test.open_session().unwrap();
        let by_natural: Option<TestUser> =
            session.find_by_natural_id(&user.natural_id().unwrap()).unwrap();
        prop_assert_eq!(by_natural.map(|u| u.id), Some(user.id));
    }

    #[test]
    fn unchanged_entities_never_flush_as_updates(count in 1usize..8) {
        let (factory, users) = scenarios::populated_factory(count);
        let inserts_before = factory.stats().entity_inserts;

        // load everything, change nothing, commit
        let mut session = factory.open_session().unwrap();
        for user in &users {
            let _: TestUser = session.find(user.id).unwrap().unwrap();
        }
        session.commit().unwrap();

        let stats = factory.stats();
        prop_assert_eq!(stats.entity_inserts, inserts_before);
        prop_assert_eq!(stats.entity_updates, 0);
    }
}
