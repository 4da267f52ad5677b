use anyhow::{bail, Result};
use std::sync::Arc;
use threadfeat::{
    discover_post_ids, init_tracing_once, DatasetAssembler, DictionarySpellChecker, FeatureOptions, JsonlPostSource,
    LexiconSentiment, TextServices, WordlistProfanity,
};

const DATA_ROOT: &str = "./data";

fn main() -> Result<()> {
    init_tracing_once();
    let opts = FeatureOptions::default().with_data_dir(DATA_ROOT).merge_env();

    let mut post_ids: Vec<String> = std::env::args().skip(1).collect();
    if post_ids.is_empty() {
        post_ids = discover_post_ids(&opts.data_dir);
    }
    if post_ids.is_empty() {
        bail!("no post ids given and no comment frames under {}", opts.data_dir.join("comment_frame").display());
    }

    let profanity_list = opts.data_dir.join("profanity.txt");
    let profanity = if profanity_list.exists() {
        WordlistProfanity::load(&profanity_list)?
    } else {
        tracing::warn!(path = %profanity_list.display(), "no profanity list; every reply scores clean");
        WordlistProfanity::default()
    };
    let services = TextServices::new(
        LexiconSentiment::default(),
        DictionarySpellChecker::load(&opts.data_dir.join("dictionary.txt"))?,
        profanity,
    );
    let posts = Arc::new(JsonlPostSource::load(&opts.data_dir.join("posts.jsonl"), opts.read_buffer_bytes)?);
    let assembler = DatasetAssembler::from_options(opts, services, posts)?;

    for post_id in &post_ids {
        // A merge invariant violation ends the whole run with a non-zero status.
        let report = assembler.run(post_id)?;
        println!(
            "{}: {} rows x {} columns -> {} (missing users: {}, failed rows: {}, anomalies: {})",
            report.post_id,
            report.rows,
            report.columns,
            report.output.display(),
            report.missing_users.count(),
            report.failed_rows.len(),
            report.anomalies.len(),
        );
    }
    Ok(())
}
