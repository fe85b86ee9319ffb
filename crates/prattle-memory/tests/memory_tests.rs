#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use prattle_memory::KeyValueStore;
    use serde_json::json;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    // ── Key-value stores ───────────────────────────────────────

    mod store {
        use super::*;
        use prattle_memory::store::{load_sequence, push_item};
        use prattle_memory::{InMemoryStore, SqliteStore};

        fn backends() -> Vec<Arc<dyn KeyValueStore>> {
            vec![
                Arc::new(InMemoryStore::new()),
                Arc::new(SqliteStore::open_in_memory().unwrap()),
            ]
        }

        #[tokio::test]
        async fn test_set_get_has_delete() {
            for store in backends() {
                assert!(!store.has("k").await.unwrap());
                store.set("k", json!({"a": 1})).await.unwrap();
                assert!(store.has("k").await.unwrap());
                assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
                store.delete("k").await.unwrap();
                assert!(!store.has("k").await.unwrap());
                assert_eq!(store.get("k").await.unwrap(), None);
            }
        }

        #[tokio::test]
        async fn test_push_creates_and_appends() {
            for store in backends() {
                store.push("seq", json!(1)).await.unwrap();
                store.push("seq", json!(2)).await.unwrap();
                assert_eq!(store.get("seq").await.unwrap(), Some(json!([1, 2])));
            }
        }

        #[tokio::test]
        async fn test_push_replaces_non_sequence() {
            for store in backends() {
                store.set("seq", json!("oops")).await.unwrap();
                store.push("seq", json!("x")).await.unwrap();
                assert_eq!(store.get("seq").await.unwrap(), Some(json!(["x"])));
            }
        }

        #[tokio::test]
        async fn test_delete_missing_key_is_ok() {
            for store in backends() {
                store.delete("never-set").await.unwrap();
            }
        }

        #[tokio::test]
        async fn test_load_sequence_tolerates_malformed_values() {
            let store = InMemoryStore::new();
            store.set("scalar", json!(42)).await.unwrap();
            let items: Vec<String> = load_sequence(&store, "scalar").await.unwrap();
            assert!(items.is_empty());

            store.set("mixed", json!(["ok", 7, "fine"])).await.unwrap();
            let items: Vec<String> = load_sequence(&store, "mixed").await.unwrap();
            assert_eq!(items, vec!["ok", "fine"]);

            let items: Vec<String> = load_sequence(&store, "absent").await.unwrap();
            assert!(items.is_empty());
        }

        #[tokio::test]
        async fn test_sqlite_persists_across_reopen() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join("prattle.db");
            {
                let store = SqliteStore::open(&path).unwrap();
                push_item(&store, "chat:1", &"hello").await.unwrap();
            }
            let store = SqliteStore::open(&path).unwrap();
            let items: Vec<String> = load_sequence(&store, "chat:1").await.unwrap();
            assert_eq!(items, vec!["hello"]);
        }

        #[tokio::test]
        async fn test_open_store_from_config() {
            use prattle_config::schema::{MemoryConfig, StoreBackend};
            let dir = tempfile::tempdir().unwrap();
            let config = MemoryConfig {
                backend: StoreBackend::Sqlite,
                db_path: dir.path().join("kv.db"),
                ..MemoryConfig::default()
            };
            let store = prattle_memory::open_store(&config).unwrap();
            store.set("k", json!(true)).await.unwrap();
            assert!(dir.path().join("kv.db").exists());

            let config = MemoryConfig {
                backend: StoreBackend::Memory,
                ..MemoryConfig::default()
            };
            let store = prattle_memory::open_store(&config).unwrap();
            assert!(!store.has("k").await.unwrap());
        }

        #[tokio::test]
        async fn test_in_memory_keys() {
            let store = InMemoryStore::new();
            store.set("b", json!(1)).await.unwrap();
            store.set("a", json!(1)).await.unwrap();
            assert_eq!(store.keys(), vec!["a", "b"]);
        }
    }

    // ── Short-term memory ──────────────────────────────────────

    mod working {
        use prattle_memory::{ChannelMap, ShortTermMemory, WorkingMemory};

        #[test]
        fn test_evicts_oldest_beyond_capacity() {
            let mut stm = ShortTermMemory::new(3);
            for reply in ["a", "b", "c", "d"] {
                stm.push(reply);
            }
            assert_eq!(stm.len(), 3);
            assert_eq!(stm.entries().collect::<Vec<_>>(), vec!["b", "c", "d"]);
            assert!(!stm.contains("a"));
        }

        #[test]
        fn test_zero_capacity_holds_one() {
            let mut stm = ShortTermMemory::new(0);
            stm.push("x");
            stm.push("y");
            assert_eq!(stm.capacity(), 1);
            assert_eq!(stm.entries().collect::<Vec<_>>(), vec!["y"]);
        }

        #[test]
        fn test_channels_are_independent() {
            let mut wm = WorkingMemory::new(5, 100);
            wm.channel("a").push("for a");
            wm.channel("b").push("for b");
            assert_eq!(wm.snapshot("a"), vec!["for a"]);
            assert_eq!(wm.active_channels(), 2);
            wm.clear("a");
            assert!(wm.snapshot("a").is_empty());
            assert_eq!(wm.snapshot("b"), vec!["for b"]);
        }

        #[test]
        fn test_working_memory_caps_channel_count() {
            let mut wm = WorkingMemory::new(5, 2);
            for channel in ["a", "b", "c", "d"] {
                wm.channel(channel).push(format!("for {channel}"));
            }
            assert_eq!(wm.active_channels(), 2);
            assert!(wm.snapshot("a").is_empty());
            assert_eq!(wm.snapshot("d"), vec!["for d"]);
        }

        #[test]
        fn test_channel_map_evicts_least_recently_used() {
            let mut map = ChannelMap::new(2);
            *map.get_or_insert_with("a", || 0) += 1;
            *map.get_or_insert_with("b", || 0) += 1;
            // Touch "a" so "b" becomes the oldest
            *map.get_mut("a").unwrap() += 1;
            map.get_or_insert_with("c", || 0);

            assert_eq!(map.len(), 2);
            assert_eq!(map.get("a"), Some(&2));
            assert!(!map.contains("b"));
            assert!(map.contains("c"));
        }

        #[test]
        fn test_channel_map_existing_channel_does_not_evict() {
            let mut map = ChannelMap::new(1);
            map.get_or_insert_with("a", || 1);
            assert_eq!(*map.get_or_insert_with("a", || 99), 1);
            assert_eq!(map.len(), 1);
            assert_eq!(map.remove("a"), Some(1));
            assert!(map.is_empty());
        }
    }

    // ── Knowledge graph ────────────────────────────────────────

    mod knowledge {
        use super::*;
        use prattle_config::LexiconConfig;
        use prattle_config::lexicon::KnowledgePattern;
        use prattle_core::{Tokenizer, Triple};
        use prattle_memory::{InMemoryStore, KnowledgeExtractor, KnowledgeGraph};

        fn extractor() -> KnowledgeExtractor {
            KnowledgeExtractor::from_patterns(&LexiconConfig::default().knowledge_patterns).unwrap()
        }

        fn graph() -> KnowledgeGraph {
            KnowledgeGraph::new(Arc::new(InMemoryStore::new()), extractor(), Tokenizer::default())
        }

        #[test]
        fn test_extract_copula() {
            let triples = extractor().extract("Paris is beautiful");
            assert_eq!(triples, vec![Triple::new("paris", "is", "beautiful")]);
        }

        #[test]
        fn test_extract_skips_article() {
            let triples = extractor().extract("my cat is a tabby");
            assert_eq!(triples, vec![Triple::new("cat", "is", "tabby")]);
        }

        #[test]
        fn test_extract_literal_predicate() {
            let triples = extractor().extract("the ball belongs to sam");
            assert!(triples.contains(&Triple::new("ball", "belongs to", "sam")));
        }

        #[test]
        fn test_extract_persian() {
            let triples = extractor().extract("کتاب را خواندم");
            assert_eq!(triples, vec![Triple::new("کتاب", "درباره", "خواندم")]);
        }

        #[test]
        fn test_extract_nothing() {
            assert!(extractor().extract("hello there").is_empty());
        }

        #[test]
        fn test_invalid_pattern_rejected() {
            let patterns = vec![KnowledgePattern {
                pattern: "(broken".into(),
                subject: 1,
                predicate: "is".into(),
                object: 2,
            }];
            assert!(KnowledgeExtractor::from_patterns(&patterns).is_err());
        }

        #[tokio::test]
        async fn test_duplicate_facts_accumulate() {
            let kg = graph();
            kg.add_knowledge("c1", "Paris is beautiful").await.unwrap();
            kg.add_knowledge("c1", "Paris is beautiful").await.unwrap();
            let triples = kg.triples("c1").await.unwrap();
            assert_eq!(triples.len(), 2);
            assert_eq!(triples[0], triples[1]);
        }

        #[tokio::test]
        async fn test_query_matches_subject_or_object() {
            let kg = graph();
            kg.add_knowledge("c1", "Paris is beautiful").await.unwrap();
            kg.add_knowledge("c1", "Sara likes pizza").await.unwrap();

            let by_subject = kg.query_knowledge("c1", "tell me about paris", None).await.unwrap();
            assert_eq!(by_subject, vec![Triple::new("paris", "is", "beautiful")]);

            let by_object = kg.query_knowledge("c1", "pizza?", None).await.unwrap();
            assert_eq!(by_object, vec![Triple::new("sara", "likes", "pizza")]);
        }

        #[tokio::test]
        async fn test_query_subject_filter() {
            let kg = graph();
            kg.add_knowledge("c1", "Sara likes pizza").await.unwrap();
            kg.add_knowledge("c1", "Pizza is tasty").await.unwrap();

            let only_sara = |s: &str| s == "sara";
            let found = kg
                .query_knowledge("c1", "pizza", Some(&only_sara))
                .await
                .unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].subject, "sara");
        }

        #[tokio::test]
        async fn test_channels_do_not_share_facts() {
            let kg = graph();
            kg.add_knowledge("c1", "Paris is beautiful").await.unwrap();
            assert!(kg.query_knowledge("c2", "paris", None).await.unwrap().is_empty());
        }
    }

    // ── Markov model ───────────────────────────────────────────

    mod markov {
        use super::*;
        use prattle_config::schema::{MarkovConfig, Selection, StartStrategy};
        use prattle_memory::{InMemoryStore, MarkovChain, MarkovModel};
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        fn rng() -> StdRng {
            StdRng::seed_from_u64(7)
        }

        #[test]
        fn test_learn_counts_grams() {
            let mut model = MarkovModel::new();
            model.learn(&tokens(&["a", "b", "c", "d"]), 2);
            assert_eq!(model.get("a b").unwrap().count("c"), Some(1));
            assert_eq!(model.get("b c").unwrap().count("d"), Some(1));
            assert_eq!(model.get("<s> a").unwrap().count("b"), Some(1));
            assert_eq!(model.get("c d").unwrap().count("</s>"), Some(1));

            model.learn(&tokens(&["a", "b", "c", "d"]), 2);
            assert_eq!(model.get("a b").unwrap().count("c"), Some(2));
            assert_eq!(model.get("b c").unwrap().count("d"), Some(2));
            assert_eq!(model.entries().len(), 4);
        }

        #[test]
        fn test_learn_empty_is_noop() {
            let mut model = MarkovModel::new();
            model.learn(&[], 2);
            assert!(model.entries().is_empty());
        }

        #[test]
        fn test_generate_greedy_follows_chain() {
            let mut model = MarkovModel::new();
            model.learn(&tokens(&["the", "cat", "sat", "down"]), 2);
            let out = model
                .generate(&tokens(&["cat"]), &MarkovConfig::default(), &mut rng())
                .unwrap();
            assert_eq!(out, "the cat sat down");
        }

        #[test]
        fn test_generate_falls_back_to_start_gram() {
            let mut model = MarkovModel::new();
            model.learn(&tokens(&["one", "two", "three"]), 2);
            let out = model.generate(&tokens(&["unrelated"]), &MarkovConfig::default(), &mut rng());
            assert_eq!(out.as_deref(), Some("one two three"));
        }

        #[test]
        fn test_generate_greedy_prefers_first_seen_on_tie() {
            let mut model = MarkovModel::new();
            model.learn(&tokens(&["x", "y", "first", "end"]), 2);
            model.learn(&tokens(&["x", "y", "second", "end"]), 2);
            let out = model
                .generate(&tokens(&["x"]), &MarkovConfig::default(), &mut rng())
                .unwrap();
            assert!(out.starts_with("x y first"));
        }

        #[test]
        fn test_generate_rejects_short_output() {
            let mut model = MarkovModel::new();
            model.learn(&tokens(&["hi", "there"]), 2);
            assert!(model.generate(&tokens(&["hi"]), &MarkovConfig::default(), &mut rng()).is_none());
        }

        #[test]
        fn test_generate_empty_model() {
            let model = MarkovModel::new();
            assert!(model.generate(&tokens(&["a"]), &MarkovConfig::default(), &mut rng()).is_none());
        }

        #[test]
        fn test_generate_respects_max_tokens() {
            let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
            let mut model = MarkovModel::new();
            model.learn(&words, 2);
            let config = MarkovConfig::default();
            let out = model.generate(&tokens(&["w0"]), &config, &mut rng()).unwrap();
            assert_eq!(out.split(' ').count(), config.max_tokens);
        }

        #[test]
        fn test_generate_weighted_and_random_start() {
            let mut model = MarkovModel::new();
            model.learn(&tokens(&["red", "fox", "runs", "fast"]), 2);
            model.learn(&tokens(&["red", "fox", "sleeps", "late"]), 2);
            let config = MarkovConfig {
                selection: Selection::Weighted,
                start: StartStrategy::Random,
                ..MarkovConfig::default()
            };
            let mut rng = rng();
            for _ in 0..10 {
                let out = model.generate(&tokens(&["red"]), &config, &mut rng).unwrap();
                assert!(out.starts_with("red fox"));
            }
        }

        #[tokio::test]
        async fn test_chain_persists_per_channel() {
            let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
            let chain = MarkovChain::new(store.clone(), MarkovConfig::default());
            chain.learn("c1", &tokens(&["a", "b", "c", "d"])).await.unwrap();
            chain.learn("c1", &tokens(&["a", "b", "c", "d"])).await.unwrap();

            let model = chain.load("c1").await.unwrap();
            assert_eq!(model.get("a b").unwrap().count("c"), Some(2));
            assert!(chain.load("c2").await.unwrap().entries().is_empty());

            let out = chain.generate("c1", &tokens(&["b"]), &mut rng()).await.unwrap();
            assert_eq!(out.as_deref(), Some("a b c d"));
        }

        #[tokio::test]
        async fn test_chain_recovers_from_malformed_model() {
            let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
            store.set("markov:c1", json!("garbage")).await.unwrap();
            let chain = MarkovChain::new(store.clone(), MarkovConfig::default());
            chain.learn("c1", &tokens(&["a", "b", "c"])).await.unwrap();
            assert_eq!(chain.load("c1").await.unwrap().entries().len(), 3);
        }
    }

    // ── Semantic matching ──────────────────────────────────────

    mod semantic {
        use super::*;
        use prattle_memory::{SemanticMatcher, cosine_similarity, term_frequency};

        #[test]
        fn test_term_frequency_is_normalized() {
            let tf = term_frequency(&tokens(&["a", "b", "a", "c"]));
            assert!((tf["a"] - 0.5).abs() < 1e-9);
            assert!((tf["b"] - 0.25).abs() < 1e-9);
            assert!((tf.values().sum::<f64>() - 1.0).abs() < 1e-9);
        }

        #[test]
        fn test_cosine_identical_is_one() {
            let v = term_frequency(&tokens(&["cats", "purr", "cats"]));
            assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
        }

        #[test]
        fn test_cosine_disjoint_is_zero() {
            let a = term_frequency(&tokens(&["cats"]));
            let b = term_frequency(&tokens(&["dogs"]));
            assert_eq!(cosine_similarity(&a, &b), 0.0);
        }

        #[test]
        fn test_cosine_empty_is_zero() {
            let a = term_frequency(&[]);
            let b = term_frequency(&tokens(&["dogs"]));
            assert_eq!(cosine_similarity(&a, &b), 0.0);
        }

        #[test]
        fn test_find_best_above_threshold() {
            let matcher = SemanticMatcher::new(0.3);
            let candidates = vec![
                ("dogs bark", tokens(&["dogs", "bark"])),
                ("cats purr softly", tokens(&["cats", "purr", "softly"])),
            ];
            let (reply, score) = matcher
                .find_best(&tokens(&["cats", "purr"]), candidates)
                .unwrap();
            assert_eq!(reply, "cats purr softly");
            assert!(score > 0.3);
        }

        #[test]
        fn test_find_best_below_threshold() {
            let matcher = SemanticMatcher::new(0.3);
            let candidates = vec![("dogs bark", tokens(&["dogs", "bark"]))];
            assert!(matcher.find_best(&tokens(&["cats"]), candidates).is_none());
        }

        #[test]
        fn test_find_best_tie_keeps_first() {
            let matcher = SemanticMatcher::new(0.3);
            let candidates = vec![
                ("first", tokens(&["sun", "shine"])),
                ("second", tokens(&["sun", "shine"])),
            ];
            let (reply, _) = matcher.find_best(&tokens(&["sun"]), candidates).unwrap();
            assert_eq!(reply, "first");
        }
    }
}
