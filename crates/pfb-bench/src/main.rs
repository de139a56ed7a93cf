//! Throughput benchmark for PFB writing and reading.
//!
//! Synthesizes a small clinical dictionary, generates a synthetic
//! program -> study -> case -> sample graph and times a write/read round trip
//! for each block codec.
//!
//! Usage: `bench-records [CASES] [DICTIONARY.json]`

use std::fs;
use std::time::{Duration, Instant};

use pfb::{
    Codec, Dictionary, Entity, EntityBuilder, PfbReader, PfbWriter, WriterOptions, synthesize,
};
use serde_json::json;

const SAMPLES_PER_CASE: usize = 3;
const READ_ITERS: u32 = 5;

// =============================================================================
// DICTIONARY
// =============================================================================

fn builtin_dictionary() -> Dictionary {
    let dictionary = json!({
        "_settings": {"version": "bench"},
        "program": {
            "properties": {
                "id": {"type": "string"},
                "type": {"type": "string"},
                "name": {"type": "string"},
                "dbgap_accession_number": {"type": "string"}
            },
            "links": []
        },
        "study": {
            "properties": {
                "name": {"type": "string"},
                "study_design": {"enum": ["Case-Control", "Cohort", "Cross-Sectional", "Not Reported"]}
            },
            "links": [{"name": "programs", "target_type": "program", "multiplicity": "many_to_one"}]
        },
        "case": {
            "properties": {
                "submitter_id": {"type": "string"},
                "age_at_index": {"type": "integer"},
                "bmi": {"type": "number"},
                "vital_status": {
                    "enum": ["Alive", "Dead", "Not Reported", "Unknown"],
                    "default": "Not Reported"
                },
                "race": {"enum": ["white", "black or african american", "asian", "other"]},
                "consent_codes": {"type": "array", "items": {"enum": ["GRU", "HMB", "DS-CA", "NPU"]}}
            },
            "links": [{"name": "studies", "target_type": "study", "multiplicity": "many_to_one"}],
            "term": {"termDef": {"term": "Case", "source": "NCIt", "term_id": "C49152"}}
        },
        "sample": {
            "properties": {
                "submitter_id": {"type": "string"},
                "sample_type": {"enum": ["Primary Tumor", "Blood Derived Normal", "Solid Tissue Normal"]},
                "is_ffpe": {"type": "boolean"},
                "days_to_collection": {"type": ["integer", "null"]}
            },
            "links": [{"name": "cases", "target_type": "case", "multiplicity": "many_to_one"}]
        }
    });
    Dictionary::from_json(dictionary).expect("built-in dictionary is an object")
}

// =============================================================================
// RECORDS
// =============================================================================

const VITAL: [&str; 4] = ["Alive", "Dead", "Not Reported", "Unknown"];
const RACE: [&str; 4] = ["white", "black or african american", "asian", "other"];
const CONSENT: [&str; 4] = ["GRU", "HMB", "DS-CA", "NPU"];
const SAMPLE_TYPE: [&str; 3] = ["Primary Tumor", "Blood Derived Normal", "Solid Tissue Normal"];

fn generate(cases: usize) -> Vec<Entity> {
    let mut records = Vec::with_capacity(2 + cases * (1 + SAMPLES_PER_CASE));
    records.push(
        EntityBuilder::new("program")
            .id("program-1")
            .string("name", "BENCH")
            .string("dbgap_accession_number", "phs000000")
            .build(),
    );
    records.push(
        EntityBuilder::new("study")
            .id("study-1")
            .string("name", "Synthetic cohort")
            .string("study_design", "Cohort")
            .relation("program-1", "program")
            .build(),
    );

    for i in 0..cases {
        let case_id = format!("case-{}", i);
        records.push(
            EntityBuilder::new("case")
                .id(case_id.clone())
                .string("submitter_id", format!("SUBJ-{:06}", i))
                .long("age_at_index", 18 + (i % 70) as i64)
                .double("bmi", 18.5 + (i % 200) as f64 / 10.0)
                .string("vital_status", VITAL[i % VITAL.len()])
                .string("race", RACE[i % RACE.len()])
                .strings("consent_codes", CONSENT.iter().take(1 + i % CONSENT.len()).copied())
                .relation("study-1", "study")
                .build(),
        );
        for j in 0..SAMPLES_PER_CASE {
            let mut sample = EntityBuilder::new("sample")
                .id(format!("sample-{}-{}", i, j))
                .string("submitter_id", format!("SUBJ-{:06}-S{}", i, j))
                .string("sample_type", SAMPLE_TYPE[j % SAMPLE_TYPE.len()])
                .boolean("is_ffpe", (i + j) % 5 == 0)
                .relation(case_id.clone(), "case");
            sample = if j == 0 {
                sample.null("days_to_collection")
            } else {
                sample.long("days_to_collection", (i * 7 + j) as i64)
            };
            records.push(sample.build());
        }
    }
    records
}

fn mb_per_sec(bytes: usize, time: Duration) -> f64 {
    (bytes as f64 / 1_000_000.0) / time.as_secs_f64()
}

fn main() {
    let mut args = std::env::args().skip(1);
    let cases: usize = args
        .next()
        .map(|n| n.parse().expect("CASES must be a number"))
        .unwrap_or(20_000);
    let dictionary = match args.next() {
        Some(path) => {
            let text = fs::read_to_string(&path).expect("Failed to read dictionary");
            Dictionary::from_json_str(&text).expect("Failed to parse dictionary")
        }
        None => builtin_dictionary(),
    };

    let synth_start = Instant::now();
    let synthesized = synthesize(&dictionary);
    println!(
        "Synthesized {} node types in {:?} ({} warnings)",
        synthesized.nodes.len(),
        synth_start.elapsed(),
        synthesized.warnings.len()
    );
    for warning in &synthesized.warnings {
        println!("  warning: {}", warning);
    }

    let records = generate(cases);
    let json_size: usize = records.iter().map(|r| r.to_json().to_string().len() + 1).sum();
    println!("Generated {} records ({} bytes as JSON lines)", records.len(), json_size);

    for codec in [Codec::Null, Codec::Deflate, Codec::Zstandard] {
        println!("\n=== Codec: {} ===", codec.name());

        let write_start = Instant::now();
        let mut writer =
            PfbWriter::new(Vec::new()).with_options(WriterOptions::new().codec(codec));
        writer.set_schema(synthesized.nodes.clone());
        writer.set_metadata(synthesized.metadata.clone());
        let written = writer
            .write(records.iter().cloned(), true)
            .expect("Failed to write");
        let bytes = writer.finish().expect("Failed to finish");
        let write_time = write_start.elapsed();
        assert_eq!(written as usize, records.len());

        println!("Write: {} bytes in {:?}", bytes.len(), write_time);
        println!("  Throughput: {:.2} MB/s", mb_per_sec(bytes.len(), write_time));
        println!(
            "  Size vs JSON: {:.1}%",
            100.0 * bytes.len() as f64 / json_size as f64
        );

        // Warmup
        let _ = PfbReader::new(bytes.as_slice())
            .expect("Failed to open")
            .count();

        let read_start = Instant::now();
        let mut read = 0;
        for _ in 0..READ_ITERS {
            let reader = PfbReader::new(bytes.as_slice()).expect("Failed to open");
            read = reader.map(|r| r.expect("Failed to read")).count();
        }
        let read_time = read_start.elapsed() / READ_ITERS;
        assert_eq!(read, records.len());

        println!(
            "Read: {:?} (avg of {} iterations)",
            read_time, READ_ITERS
        );
        println!("  Throughput: {:.2} MB/s", mb_per_sec(bytes.len(), read_time));
        println!(
            "  Records/s: {:.0}",
            read as f64 / read_time.as_secs_f64()
        );
    }
}
