//! End-to-end matching scenarios over a deterministic transcriber.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use speechmatch_audio::AudioBuffer;
use speechmatch_matching::{
    AlgorithmRegistry, Group, MatchError, MatchOptions, Matcher, Recording, Transcript, Verdict,
};
use speechmatch_speech::{Candidates, FixedTranscriber};

fn recording(asr: &Arc<FixedTranscriber>, id: &str) -> Arc<Recording> {
    Arc::new(Recording::new(id, AudioBuffer::silent(id), asr.clone()))
}

fn transcript(pairs: &[(&str, f64)]) -> Transcript {
    let candidates: Candidates = pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect();
    Transcript::new(candidates, "plain").unwrap()
}

#[test]
fn three_versus_ten() {
    let asr = Arc::new(
        FixedTranscriber::new()
            .with("A1", [("three", 0.9)])
            .with("A2", [("three", 0.9)])
            .with("B1", [("ten", 0.8)]),
    );
    let groups = [
        Group::with_recordings("three", [recording(&asr, "A1")]),
        Group::with_recordings("ten", [recording(&asr, "B1")]),
    ];

    let result = recording(&asr, "A2")
        .match_groups(&groups, &MatchOptions::default())
        .unwrap();
    assert_eq!(result.identifier(), Some("three"));
    assert_eq!(result.winner(&groups).unwrap().identifier(), "three");
}

#[test]
fn identical_distributions_are_undecided() {
    let asr = Arc::new(
        FixedTranscriber::new()
            .with("Q", [("x", 0.5)])
            .with("G1", [("x", 0.5)])
            .with("G2", [("x", 0.5)]),
    );
    let groups = [
        Group::with_recordings("one", [recording(&asr, "G1")]),
        Group::with_recordings("two", [recording(&asr, "G2")]),
    ];
    let query = recording(&asr, "Q");

    let result = query
        .match_groups(&groups, &MatchOptions::default().with_indecision(true))
        .unwrap();
    assert_eq!(result.verdict, Verdict::Indecision);
    assert_eq!(result.scores[0].mean, result.scores[1].mean);

    let result = query.match_groups(&groups, &MatchOptions::default()).unwrap();
    assert_eq!(
        result.verdict,
        Verdict::Match {
            index: 0,
            identifier: "one".into()
        }
    );
}

#[test]
fn every_builtin_algorithm_is_symmetric_and_self_maximal() {
    let samples = [
        transcript(&[("three", 0.9), ("tree", 0.4), ("free", 0.05)]),
        transcript(&[("ten", 0.8), ("tin", 0.3)]),
        transcript(&[("three", 0.2), ("ten", 0.2), ("then", 0.6)]),
        transcript(&[("x", 0.5)]),
        transcript(&[("thirty three", 1.0), ("thirty", 0.1)]),
    ];
    let registry = AlgorithmRegistry::with_defaults();

    for name in registry.similarity_names() {
        let alg = registry.similarity(&name).unwrap();
        for a in &samples {
            let own = a.similarity_using(a, alg.as_ref()).unwrap();
            for b in &samples {
                let ab = a.similarity_using(b, alg.as_ref()).unwrap();
                let ba = b.similarity_using(a, alg.as_ref()).unwrap();
                assert_eq!(ab, ba, "{name} not symmetric for {a} / {b}");
                assert!(ab >= 0.0);
                assert!(ab <= own + 1e-12, "{name}: {a} scores {ab} against {b}, {own} against itself");
            }
        }
    }
}

#[test]
fn confident_hypotheses_score_higher() {
    let sure = transcript(&[("ten", 0.9)]);
    let unsure = transcript(&[("ten", 0.2)]);
    assert!(sure.similarity(&sure).unwrap() > unsure.similarity(&unsure).unwrap());
}

#[test]
fn concurrent_transcript_requests_share_one_call() {
    let asr = Arc::new(
        FixedTranscriber::new()
            .with("A1", [("three", 0.9)])
            .with_latency(Duration::from_millis(30)),
    );
    let rec = recording(&asr, "A1");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let rec = Arc::clone(&rec);
            thread::spawn(move || rec.transcript().unwrap())
        })
        .collect();
    let all: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(asr.calls(), 1);
    assert!(all.iter().all(|t| Arc::ptr_eq(t, &all[0])));
    assert_eq!(rec.transcript().unwrap().text(), "three");
    assert_eq!(asr.calls(), 1);
}

#[test]
fn balancing_uses_smallest_group_size() {
    let mut asr = FixedTranscriber::new().with("Q", [("seven", 0.9)]);
    for i in 0..3 {
        asr.insert(format!("s{i}"), [("seven", 0.8)]);
    }
    for i in 0..7 {
        asr.insert(format!("l{i}"), [("eleven", 0.8)]);
    }
    let asr = Arc::new(asr);
    let small = Group::with_recordings("seven", (0..3).map(|i| recording(&asr, &format!("s{i}"))));
    let large = Group::with_recordings("eleven", (0..7).map(|i| recording(&asr, &format!("l{i}"))));
    let groups = [small, large];
    let query = recording(&asr, "Q");

    let options = MatchOptions::default().with_min_group_size(true);
    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        let result = Matcher::new()
            .match_recording_with_rng(&query, &groups, &options, &mut rng)
            .unwrap();
        assert_eq!(result.scores[0].scored, 3);
        assert_eq!(result.scores[1].scored, 3);
    }

    let result = query.match_groups(&groups, &MatchOptions::default()).unwrap();
    assert_eq!(result.scores[1].scored, 7);
    assert_eq!(result.identifier(), Some("seven"));
}

#[test]
fn sample_bounds() {
    let asr = Arc::new(FixedTranscriber::new());
    let group = Group::with_recordings("g", (0..4).map(|i| recording(&asr, &format!("r{i}"))));
    let mut rng = StdRng::seed_from_u64(11);

    assert!(matches!(
        group.sample(5, &mut rng),
        Err(MatchError::InsufficientSize { requested: 5, available: 4, .. })
    ));

    let all = group.sample(4, &mut rng).unwrap();
    assert_eq!(all.len(), 4);
    for member in &group {
        assert_eq!(all.iter().filter(|r| Arc::ptr_eq(r, member)).count(), 1);
    }
}

#[test]
fn probable_texts_at_zero_is_everything() {
    for t in [
        transcript(&[("three", 0.9), ("tree", 0.4)]),
        transcript(&[("x", 0.0)]),
        transcript(&[("a", 1.0), ("b", 0.5), ("c", 0.25)]),
    ] {
        assert_eq!(&t.probable_texts(0.0), t.candidates());
    }
}

#[test]
fn failing_member_aborts_without_partial_result() {
    let asr = Arc::new(
        FixedTranscriber::new()
            .with("Q", [("three", 0.9)])
            .with("A1", [("three", 0.9)]),
    );
    let groups = [
        Group::with_recordings("three", [recording(&asr, "A1")]),
        Group::with_recordings("ten", [recording(&asr, "broken")]),
    ];
    let err = recording(&asr, "Q")
        .match_groups(&groups, &MatchOptions::default())
        .unwrap_err();
    assert!(matches!(err, MatchError::Transcription(_)));
}
