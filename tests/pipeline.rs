use topicflow::opts::{ChunkOpts, ClusterOpts, Opts};
use topicflow::output_type::OutputType;
use topicflow::suppliers::FileSupplier;
use topicflow::{
    Cue, EmbeddedChunk, EmbeddingSupplier, Error, TopicFlow, chunk, cluster, parse_cues,
};

/// Embeds by topic keyword and refuses text that still carries music markers.
struct KeywordEmbedder;

impl EmbeddingSupplier for KeywordEmbedder {
    fn embed(&self, texts: &[&str]) -> topicflow::Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                if t.contains('♪') {
                    return Err(Error::Message(format!("uncleaned input: {t}")));
                }
                let cats = t.matches("cat").count() as f32;
                let rockets = t.matches("rocket").count() as f32;
                Ok(vec![cats, rockets])
            })
            .collect()
    }
}

fn cue(start: f64, end: f64, text: &str) -> Cue {
    Cue {
        start,
        end,
        text: text.to_string(),
    }
}

#[test]
fn chunks_overlapping_windows() -> anyhow::Result<()> {
    let cues = vec![
        cue(0.0, 10.0, "a"),
        cue(10.0, 20.0, "b"),
        cue(20.0, 35.0, "c"),
        cue(35.0, 50.0, "d"),
    ];

    let chunks = chunk(&cues, &ChunkOpts::default())?;

    let got: Vec<(f64, f64, &str)> = chunks
        .iter()
        .map(|c| (c.start, c.end, c.text.as_str()))
        .collect();
    // Windows keep starting until the start reaches the last cue's end, so a short tail
    // window follows the three full ones.
    assert_eq!(
        got,
        vec![
            (0.0, 30.0, "a b c"),
            (15.0, 45.0, "b c d"),
            (30.0, 50.0, "c d"),
            (45.0, 50.0, "d"),
        ]
    );
    let ids: Vec<usize> = chunks.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    Ok(())
}

#[test]
fn chunking_rejects_bad_input() {
    let err = chunk(&[], &ChunkOpts::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyInput(_)));
    assert_eq!(err.to_string(), "no cues provided");

    let cues = vec![cue(0.0, 10.0, "a")];
    let opts = ChunkOpts {
        chunk_size: 10.0,
        overlap: 10.0,
    };
    let err = chunk(&cues, &opts).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn clustering_rejects_empty_batch() {
    let err = cluster(&[], &ClusterOpts::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyInput(_)));
    assert_eq!(err.to_string(), "no embeddings provided");
}

#[test]
fn clusters_parsed_captions_by_topic() -> anyhow::Result<()> {
    let raw = std::fs::read_to_string("tests/fixtures/cats_and_rockets.vtt")?;
    let cues = parse_cues(&raw)?;
    assert_eq!(cues.len(), 8);

    let chunks = chunk(&cues, &ChunkOpts::default())?;
    assert_eq!(chunks.len(), 7);

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let err = KeywordEmbedder.embed(&texts).unwrap_err();
    assert!(err.to_string().contains("uncleaned"));

    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .map(|c| {
            let cats = c.text.matches("cat").count() as f32;
            let rockets = c.text.matches("rocket").count() as f32;
            EmbeddedChunk::new(c, vec![cats, rockets])
        })
        .collect();

    let clustering = cluster(&embedded, &ClusterOpts::default())?;
    let members: Vec<Vec<usize>> = clustering
        .clusters
        .iter()
        .map(|c| c.chunk_ids.clone())
        .collect();
    assert_eq!(members, vec![vec![0, 1, 2], vec![3, 4, 5, 6]]);
    assert!(clustering.noise.is_empty());

    let cats = &clustering.clusters[0];
    assert_eq!((cats.start, cats.end), (0.0, 60.0));
    let rockets = &clustering.clusters[1];
    assert_eq!((rockets.start, rockets.end), (45.0, 100.0));

    Ok(())
}

#[test]
fn analyzes_caption_file_end_to_end() -> anyhow::Result<()> {
    let flow = TopicFlow::new(FileSupplier::with_root("tests/fixtures"), KeywordEmbedder);

    let analysis = flow.analyze("cats_and_rockets.vtt", &Opts::default())?;
    assert_eq!(analysis.chunks.len(), 7);
    assert_eq!(analysis.clusters.len(), 2);
    assert!(analysis.clusters[0].texts.contains("cat"));
    assert!(analysis.clusters[1].texts.contains("rocket"));

    let mut out = Vec::new();
    let opts = Opts {
        output_type: OutputType::Vtt,
        ..Opts::default()
    };
    flow.analyze_to_writer("cats_and_rockets.vtt", &mut out, &opts)?;

    let vtt = String::from_utf8(out)?;
    let topics = parse_cues(&vtt)?;
    assert_eq!(topics.len(), 2);
    assert_eq!(topics[1].end, 100.0);

    Ok(())
}

#[test]
fn missing_caption_file_is_not_found() {
    let flow = TopicFlow::new(FileSupplier::with_root("tests/fixtures"), KeywordEmbedder);
    let err = flow
        .analyze("does-not-exist.vtt", &Opts::default())
        .unwrap_err();
    assert!(err.is_not_found());
}
