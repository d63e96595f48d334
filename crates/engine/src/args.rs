//! Argument builder for the external transcoding engine.
//!
//! Pure decision procedure: given a job's sources and derived paths, produce
//! the full ffmpeg argument list plus any side files (chapter metadata) that
//! must be written before the process is spawned. Nothing here touches the
//! filesystem or spawns anything.

use crate::job::{JobPaths, SourceFile};
use crate::validate::{is_copy_compatible, source_extension};

/// Fixed re-encode preset for anything that cannot stream-copy: mono AAC at a
/// spoken-word bitrate. Concatenated output always uses this preset because
/// heterogeneous sources cannot safely stream-copy.
const ENCODE_PRESET: &[&str] = &["-c:a", "aac", "-b:a", "64k", "-ar", "44100", "-ac", "1"];

/// A side file the caller must write before spawning the transcode.
#[derive(Debug, Clone, PartialEq)]
pub struct SideFile {
    pub path: std::path::PathBuf,
    pub contents: String,
}

/// Complete plan for one transcode invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    /// Ordered ffmpeg arguments, ending with the temp output path.
    pub args: Vec<String>,
    /// Side files to write first (chapter metadata for multi-file jobs).
    pub side_files: Vec<SideFile>,
}

/// Build the transcode plan for a job.
pub fn build_conversion_plan(
    sources: &[SourceFile],
    is_multi_file: bool,
    paths: &JobPaths,
) -> ConversionPlan {
    let mut args = vec!["-y".to_string()];
    let mut side_files = Vec::new();

    if is_multi_file && sources.len() > 1 {
        let metadata = build_chapter_metadata(sources);
        side_files.push(SideFile {
            path: paths.chapter_metadata.clone(),
            contents: metadata,
        });

        let all_same_path = sources.iter().all(|s| s.path == sources[0].path);
        if all_same_path {
            // Chapters are time ranges inside one physical file: one audio
            // input plus the chapter table, no concatenation.
            args.push("-i".to_string());
            args.push(sources[0].path.to_string_lossy().to_string());
            args.push("-i".to_string());
            args.push(paths.chapter_metadata.to_string_lossy().to_string());
            args.extend(["-map", "0:a", "-map_metadata", "1", "-map_chapters", "1"].map(String::from));
        } else {
            for source in sources {
                args.push("-i".to_string());
                args.push(source.path.to_string_lossy().to_string());
            }
            args.push("-i".to_string());
            args.push(paths.chapter_metadata.to_string_lossy().to_string());

            let n = sources.len();
            let mut filter = String::new();
            for i in 0..n {
                filter.push_str(&format!("[{}:a]", i));
            }
            filter.push_str(&format!("concat=n={}:v=0:a=1[a]", n));
            args.push("-filter_complex".to_string());
            args.push(filter);
            args.push("-map".to_string());
            args.push("[a]".to_string());
            args.push("-map_metadata".to_string());
            args.push(n.to_string());
            args.push("-map_chapters".to_string());
            args.push(n.to_string());
        }
        args.extend(ENCODE_PRESET.iter().map(|s| s.to_string()));
    } else {
        let source = &sources[0];
        args.push("-i".to_string());
        args.push(source.path.to_string_lossy().to_string());
        args.extend(["-map", "0:a"].map(String::from));

        let ext = source_extension(&source.path).unwrap_or_default();
        if is_copy_compatible(&ext) {
            // Codec already fits the destination container: repackage only.
            args.extend(["-c:a", "copy"].map(String::from));
        } else {
            args.push("-vn".to_string());
            args.extend(ENCODE_PRESET.iter().map(|s| s.to_string()));
        }
    }

    args.extend(["-f", "mp4", "-progress", "pipe:1", "-nostats"].map(String::from));
    args.push(paths.temp_output.to_string_lossy().to_string());

    ConversionPlan { args, side_files }
}

/// Synthesize an ffmpeg metadata payload with one chapter per source file.
///
/// Offsets are millisecond running sums of each source's duration; a missing
/// duration contributes zero and produces a zero-length chapter.
pub fn build_chapter_metadata(sources: &[SourceFile]) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    let mut offset_ms: u64 = 0;

    for source in sources {
        let duration_ms = source
            .duration_secs
            .map(|d| (d * 1000.0).round().max(0.0) as u64)
            .unwrap_or(0);
        let end_ms = offset_ms + duration_ms;

        out.push_str("\n[CHAPTER]\nTIMEBASE=1/1000\n");
        out.push_str(&format!("START={}\n", offset_ms));
        out.push_str(&format!("END={}\n", end_ms));
        out.push_str(&format!("title={}\n", sanitize_metadata_value(&source.title)));

        offset_ms = end_ms;
    }

    out
}

/// Strip ffmetadata control characters from a chapter title.
fn sanitize_metadata_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '=' | ';' | '#' | '\\' | '\n' | '\r'))
        .collect()
}
