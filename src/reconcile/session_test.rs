//! Tests for the reconciliation session and workflow.

#[cfg(test)]
mod tests {
    use crate::policy::FieldPolicy;
    use crate::reconcile::{
        compute_patch, ApplyPlan, Completion, ConfigSink, ConfigSource, Outcome, ReconcileError,
        Session, SessionState, SourceError, Workflow,
    };
    use crate::value::{from_json, Value};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn doc(json: &str) -> Value {
        from_json(json).unwrap()
    }

    const MYINDEX: &str = r#"{
        "myindex": {
            "settings": {
                "index": {
                    "number_of_shards": "1",
                    "number_of_replicas": "1",
                    "uuid": "Xq3n0mQ8RZ2fY1s",
                    "creation_date": "1700000000000",
                    "provided_name": "myindex",
                    "version": {"created": "8110099"},
                    "routing": {"allocation": {"include": {"_tier_preference": "data_content"}}}
                }
            }
        }
    }"#;

    /// In-memory cluster holding one settings document per index.
    #[derive(Default)]
    struct FakeCluster {
        documents: HashMap<String, Value>,
        fetch_error: Option<SourceError>,
        apply_error: RefCell<Option<SourceError>>,
        applied: RefCell<Vec<(String, Value)>>,
    }

    impl FakeCluster {
        fn with_index(name: &str, json: &str) -> Self {
            let mut cluster = FakeCluster::default();
            cluster.documents.insert(name.to_string(), doc(json));
            cluster
        }
    }

    impl ConfigSource for FakeCluster {
        fn fetch_settings(&self, target: &str) -> Result<Value, SourceError> {
            if let Some(err) = &self.fetch_error {
                return Err(err.clone());
            }
            self.documents
                .get(target)
                .cloned()
                .ok_or_else(|| SourceError::not_found(format!("no such index [{}]", target)))
        }
    }

    impl ConfigSink for FakeCluster {
        fn apply_settings(&self, target: &str, patch: &Value) -> Result<(), SourceError> {
            if let Some(err) = self.apply_error.borrow_mut().take() {
                return Err(err);
            }
            self.applied
                .borrow_mut()
                .push((target.to_string(), patch.clone()));
            Ok(())
        }
    }

    fn workflow(cluster: &FakeCluster) -> Workflow<&FakeCluster, &FakeCluster> {
        Workflow::new(FieldPolicy::default(), cluster, cluster)
    }

    /// Replaces `from` with `to` in the candidate text of the workflow.
    fn edit_replace(wf: &mut Workflow<&FakeCluster, &FakeCluster>, from: &str, to: &str) {
        let text = wf.session().candidate_text().replace(from, to);
        assert_ne!(text, wf.session().candidate_text(), "edit did not change anything");
        wf.edit(text).unwrap();
    }

    #[test]
    fn test_fetch_populates_baseline_and_pretty_text() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);

        wf.fetch("myindex").unwrap();

        let session = wf.session();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.target(), Some("myindex"));
        assert_eq!(session.baseline(), Some(&doc(MYINDEX)));
        assert!(session.candidate_text().starts_with("{\n  \"myindex\": {"));
        assert_eq!(doc(session.candidate_text()), doc(MYINDEX));
    }

    #[test]
    fn test_fetch_with_empty_target() {
        let cluster = FakeCluster::default();
        let mut wf = workflow(&cluster);

        assert_eq!(wf.fetch(""), Err(ReconcileError::MissingTarget));
        assert_eq!(wf.fetch("   "), Err(ReconcileError::MissingTarget));
        assert_eq!(wf.session().state(), SessionState::Idle);
        assert_eq!(wf.session().last_error(), Some(&ReconcileError::MissingTarget));
        assert_eq!(wf.session().target(), None);
    }

    #[test]
    fn test_fetch_trims_target() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);

        wf.fetch("  myindex\n").unwrap();

        assert_eq!(wf.session().target(), Some("myindex"));
        assert_eq!(wf.session().baseline(), Some(&doc(MYINDEX)));
    }

    #[test]
    fn test_fetch_not_found_keeps_message() {
        let cluster = FakeCluster::default();
        let mut wf = workflow(&cluster);

        let err = wf.fetch("nope").unwrap_err();
        assert_eq!(
            err,
            ReconcileError::Fetch {
                target: "nope".into(),
                source: SourceError::not_found("no such index [nope]"),
            }
        );
        assert_eq!(wf.session().state(), SessionState::Idle);
        assert_eq!(wf.session().last_error(), Some(&err));
        assert!(wf.session().baseline().is_none());
    }

    #[test]
    fn test_unwrapped_patch_is_submitted() {
        let cluster = FakeCluster::with_index(
            "myindex",
            r#"{"myindex":{"settings":{"index":{"number_of_replicas":"1"}}}}"#,
        );
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        wf.edit(r#"{"myindex":{"settings":{"index":{"number_of_replicas":"2"}}}}"#)
            .unwrap();

        let outcome = wf.apply().unwrap();

        assert_eq!(
            outcome,
            Outcome::Applied {
                patch: doc(r#"{"number_of_replicas":"2"}"#),
                stripped: vec![],
            }
        );
        assert_eq!(wf.session().state(), SessionState::Applied);
        assert_eq!(
            *cluster.applied.borrow(),
            vec![("myindex".to_string(), doc(r#"{"number_of_replicas":"2"}"#))]
        );
    }

    #[test]
    fn test_candidate_with_less_wrapping_than_baseline() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        // Operator pasted only the inner settings section.
        wf.edit(r#"{"number_of_replicas":"0","refresh_interval":"30s"}"#)
            .unwrap();

        let outcome = wf.apply().unwrap();
        assert_eq!(
            outcome,
            Outcome::Applied {
                patch: doc(r#"{"number_of_replicas":"0","refresh_interval":"30s"}"#),
                stripped: vec![],
            }
        );
    }

    #[test]
    fn test_apply_unchanged_text_is_no_change() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();

        let outcome = wf.apply().unwrap();

        assert_eq!(outcome, Outcome::NoChange { stripped: vec![] });
        assert_eq!(wf.session().state(), SessionState::NoChange);
        assert!(cluster.applied.borrow().is_empty());
    }

    #[test]
    fn test_editing_only_protected_field_is_no_change() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        edit_replace(&mut wf, "Xq3n0mQ8RZ2fY1s", "changed-uuid");

        let outcome = wf.apply().unwrap();

        assert_eq!(outcome, Outcome::NoChange { stripped: vec![] });
        assert!(cluster.applied.borrow().is_empty());
    }

    #[test]
    fn test_new_protected_member_is_reported_but_not_submitted() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        edit_replace(
            &mut wf,
            "\"number_of_replicas\": \"1\"",
            "\"number_of_replicas\": \"1\", \"blocks\": {\"uuid\": \"x\"}",
        );

        let outcome = wf.apply().unwrap();

        assert_eq!(
            outcome,
            Outcome::NoChange {
                stripped: vec!["uuid".to_string()],
            }
        );
        assert!(outcome.message().contains("(uuid)"));
        assert!(cluster.applied.borrow().is_empty());
    }

    #[test]
    fn test_real_change_alongside_stripped_field() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        edit_replace(
            &mut wf,
            "\"number_of_replicas\": \"1\"",
            "\"number_of_replicas\": \"2\", \"blocks\": {\"write\": \"true\", \"hidden\": \"true\"}",
        );

        let outcome = wf.apply().unwrap();

        assert_eq!(
            outcome,
            Outcome::Applied {
                patch: doc(r#"{"number_of_replicas":"2","blocks":{"write":"true"}}"#),
                stripped: vec!["hidden".to_string()],
            }
        );
    }

    #[test]
    fn test_removed_line_has_no_effect() {
        let cluster = FakeCluster::with_index(
            "myindex",
            r#"{"myindex":{"settings":{"index":{"number_of_replicas":"1","refresh_interval":"1s"}}}}"#,
        );
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        wf.edit(r#"{"myindex":{"settings":{"index":{"number_of_replicas":"1"}}}}"#)
            .unwrap();

        assert_eq!(wf.apply().unwrap(), Outcome::NoChange { stripped: vec![] });
    }

    #[test]
    fn test_malformed_text_fails_fast() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        wf.edit(r#"{"myindex": {"settings": "#).unwrap();

        let err = wf.apply().unwrap_err();

        assert!(matches!(err, ReconcileError::MalformedInput { .. }));
        assert_eq!(wf.session().state(), SessionState::Ready);
        assert_eq!(wf.session().baseline(), Some(&doc(MYINDEX)));
        assert!(cluster.applied.borrow().is_empty());
    }

    #[test]
    fn test_non_object_candidate_is_malformed() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        wf.edit("[1, 2, 3]").unwrap();

        assert!(matches!(
            wf.apply(),
            Err(ReconcileError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_apply_rejection_is_surfaced_and_retryable() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();
        edit_replace(&mut wf, "\"number_of_shards\": \"1\"", "\"number_of_shards\": \"3\"");
        let reason = "illegal_argument_exception: final myindex setting [index.number_of_shards], not updateable";
        *cluster.apply_error.borrow_mut() = Some(SourceError::rejected(reason));

        let err = wf.apply().unwrap_err();

        assert_eq!(err.source_error().map(|e| e.message.as_str()), Some(reason));
        assert!(err.to_string().contains(reason));
        assert_eq!(wf.session().state(), SessionState::Ready);
        assert_eq!(wf.session().last_error(), Some(&err));
        let text_after_failure = wf.session().candidate_text().to_string();
        assert!(text_after_failure.contains("\"number_of_shards\": \"3\""));

        // Retry without fetching again.
        let outcome = wf.apply().unwrap();
        assert_eq!(
            outcome,
            Outcome::Applied {
                patch: doc(r#"{"number_of_shards":"3"}"#),
                stripped: vec![],
            }
        );
    }

    #[test]
    fn test_apply_without_target() {
        let mut session = Session::default();
        session.edit(r#"{"a":"1"}"#).unwrap();
        assert_eq!(session.begin_apply(), Err(ReconcileError::MissingTarget));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_rejected_draft_returns_to_ready() {
        let mut session =
            Session::with_draft(FieldPolicy::default(), "myindex", r#"{"number_of_replicas":"2"}"#);

        let ticket = match session.begin_apply().unwrap() {
            ApplyPlan::Submit { ticket, .. } => ticket,
            other => panic!("expected submit, got {:?}", other),
        };
        assert_eq!(session.state(), SessionState::Applying);
        assert!(session.state().is_in_flight());

        let err = session
            .complete_apply(ticket, Err(SourceError::rejected("not updateable")))
            .unwrap_err();

        assert_eq!(session.state(), SessionState::Ready);
        assert!(!session.state().is_in_flight());
        assert_eq!(session.last_error(), Some(&err));
        assert_eq!(session.candidate_text(), r#"{"number_of_replicas":"2"}"#);
        assert!(session.begin_apply().is_ok());
    }

    #[test]
    fn test_apply_empty_text_is_malformed() {
        let mut session = Session::with_draft(FieldPolicy::default(), "myindex", "");
        assert!(matches!(
            session.begin_apply(),
            Err(ReconcileError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_draft_without_baseline_submits_scrubbed_candidate() {
        let mut session = Session::with_draft(
            FieldPolicy::default(),
            "myindex",
            r#"{"myindex":{"settings":{"index":{"uuid":"a","number_of_replicas":"2"}}}}"#,
        );
        assert_eq!(session.state(), SessionState::Editing);

        match session.begin_apply().unwrap() {
            ApplyPlan::Submit { patch, stripped, .. } => {
                assert_eq!(patch, doc(r#"{"number_of_replicas":"2"}"#));
                assert_eq!(stripped, vec!["uuid".to_string()]);
            }
            other => panic!("expected submit, got {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Applying);
    }

    #[test]
    fn test_stale_fetch_result_is_discarded() {
        let mut session = Session::default();
        let first = session.begin_fetch("old").unwrap();
        let second = session.begin_fetch("new").unwrap();

        let fresh = doc(r#"{"new":{"settings":{"index":{"a":"2"}}}}"#);
        assert_eq!(
            session.complete_fetch(second, Ok(fresh.clone())),
            Ok(Completion::Accepted(()))
        );
        let late = session.complete_fetch(first, Ok(doc(r#"{"old":{}}"#)));

        assert_eq!(late, Ok(Completion::Discarded));
        assert_eq!(session.target(), Some("new"));
        assert_eq!(session.baseline(), Some(&fresh));
    }

    #[test]
    fn test_result_after_reset_is_discarded() {
        let mut session = Session::default();
        let ticket = session.begin_fetch("myindex").unwrap();
        session.reset();

        assert_eq!(
            session.complete_fetch(ticket, Ok(doc(MYINDEX))),
            Ok(Completion::Discarded)
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.baseline().is_none());
        assert_eq!(session.candidate_text(), "");
    }

    #[test]
    fn test_apply_result_discarded_after_new_fetch() {
        let mut session = Session::default();
        let ticket = session.begin_fetch("myindex").unwrap();
        session.complete_fetch(ticket, Ok(doc(MYINDEX))).unwrap();
        let text = session.candidate_text().replace("\"number_of_replicas\": \"1\"", "\"number_of_replicas\": \"4\"");
        session.edit(text).unwrap();

        let apply_ticket = match session.begin_apply().unwrap() {
            ApplyPlan::Submit { ticket, .. } => ticket,
            other => panic!("expected submit, got {:?}", other),
        };
        let refetch = session.begin_fetch("myindex").unwrap();

        assert_eq!(
            session.complete_apply(apply_ticket, Ok(())),
            Ok(Completion::Discarded)
        );
        assert_eq!(session.state(), SessionState::Fetching);
        assert!(session.last_outcome().is_none());
        session.complete_fetch(refetch, Ok(doc(MYINDEX))).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_fetch_ticket_cannot_complete_apply() {
        let mut session = Session::default();
        let fetch = session.begin_fetch("myindex").unwrap();
        let forged = crate::reconcile::ApplyTicket {
            epoch: fetch.epoch,
            target: fetch.target.clone(),
        };
        assert_eq!(session.complete_apply(forged, Ok(())), Ok(Completion::Discarded));
        assert_eq!(session.state(), SessionState::Fetching);
    }

    #[test]
    fn test_edit_while_fetching_is_busy() {
        let mut session = Session::default();
        let _ticket = session.begin_fetch("myindex").unwrap();
        assert_eq!(
            session.edit("{}"),
            Err(ReconcileError::Busy {
                state: SessionState::Fetching
            })
        );
        assert_eq!(
            session.begin_apply(),
            Err(ReconcileError::Busy {
                state: SessionState::Fetching
            })
        );
    }

    #[test]
    fn test_empty_target_does_not_disturb_in_flight_fetch() {
        let mut session = Session::default();
        let ticket = session.begin_fetch("myindex").unwrap();
        assert_eq!(session.begin_fetch(""), Err(ReconcileError::MissingTarget));
        assert_eq!(session.state(), SessionState::Fetching);
        assert_eq!(
            session.complete_fetch(ticket, Ok(doc(MYINDEX))),
            Ok(Completion::Accepted(()))
        );
    }

    #[test]
    fn test_switching_target_clears_baseline() {
        let mut cluster = FakeCluster::with_index("myindex", MYINDEX);
        cluster
            .documents
            .insert("other".into(), doc(r#"{"other":{"settings":{"index":{"a":"1"}}}}"#));
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();

        assert!(wf.fetch("missing").is_err());

        assert_eq!(wf.session().target(), Some("missing"));
        assert!(wf.session().baseline().is_none());
        assert_eq!(wf.session().candidate_text(), "");
        assert_eq!(wf.session().state(), SessionState::Idle);
    }

    #[test]
    fn test_failed_refetch_of_same_target_keeps_baseline() {
        let mut cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut session = Session::default();
        {
            let mut wf = Workflow::with_session(session, &cluster, &cluster);
            wf.fetch("myindex").unwrap();
            session = wf.into_session();
        }
        cluster.fetch_error = Some(SourceError::network("connection refused"));
        let mut wf = Workflow::with_session(session, &cluster, &cluster);

        assert!(wf.fetch("myindex").is_err());
        assert_eq!(wf.session().baseline(), Some(&doc(MYINDEX)));
        assert_eq!(wf.session().state(), SessionState::Ready);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();

        wf.reset();

        let session = wf.session();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.target(), None);
        assert!(session.baseline().is_none());
        assert_eq!(session.candidate_text(), "");
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_protected_fields_in_candidate() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let mut wf = workflow(&cluster);
        wf.fetch("myindex").unwrap();

        assert_eq!(
            wf.session().protected_fields_in_candidate().unwrap(),
            vec![
                "uuid".to_string(),
                "creation_date".to_string(),
                "provided_name".to_string(),
                "version".to_string(),
            ]
        );
    }

    #[test]
    fn test_custom_policy_is_honoured() {
        let cluster = FakeCluster::with_index("myindex", MYINDEX);
        let policy = FieldPolicy::default().protect("number_of_shards");
        let mut wf = Workflow::new(policy, &cluster, &cluster);
        wf.fetch("myindex").unwrap();
        edit_replace(&mut wf, "\"number_of_shards\": \"1\"", "\"number_of_shards\": \"2\"");

        assert_eq!(wf.apply().unwrap(), Outcome::NoChange { stripped: vec![] });
    }

    #[test]
    fn test_compute_patch_unwraps_both_sides_independently() {
        let baseline = doc(r#"{"myindex":{"settings":{"index":{"a":"1","b":"1"}}}}"#);
        let candidate = doc(r#"{"myindex":{"settings":{"a":"1","b":"2"}}}"#);
        let result =
            compute_patch(&candidate, Some(&baseline), "myindex", &FieldPolicy::default()).unwrap();
        assert_eq!(result.filtered, doc(r#"{"b":"2"}"#));
    }
}
