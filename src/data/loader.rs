use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// One row of a raw dataset file: a single agent observed at a single frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrajectoryRecord {
    pub frame_id: i64,
    pub agent_id: i64,
    pub x: f32,
    pub y: f32,
}

/// All observations sharing one frame id, in file order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_id: i64,
    pub observations: Vec<(i64, f32, f32)>,
}

/// The parsed, frame-ordered log of one dataset file. Read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct FrameLog {
    path: PathBuf,
    frames: Vec<Frame>,
    agent_ids: BTreeSet<i64>,
}

impl FrameLog {
    /// Parses a delimited text file with one `(frame, agent, x, y)` row per
    /// line. Frame and agent ids may be written as floats (the ETH/UCY
    /// datasets use `10.0\t1.0\t...`); they are truncated to integers.
    /// A malformed line aborts the whole load.
    pub fn load(path: impl AsRef<Path>, delimiter: char) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record = parse_line(&line, delimiter).map_err(|reason| Error::Parse {
                path: path.clone(),
                line: idx + 1,
                reason,
            })?;
            records.push(record);
        }

        let log = Self::build(path, records)?;
        debug!(
            path = %log.path.display(),
            frames = log.num_frames(),
            agents = log.num_agents(),
            "loaded dataset"
        );
        Ok(log)
    }

    /// Loads several dataset files from one directory. The first failure
    /// aborts the whole load; already parsed logs are discarded.
    pub fn load_all(
        data_path: impl AsRef<Path>,
        datasets: &[String],
        delimiter: char,
    ) -> Result<Vec<FrameLog>, Error> {
        datasets
            .iter()
            .map(|name| Self::load(data_path.as_ref().join(name), delimiter))
            .collect()
    }

    /// Builds a log directly from records. Used by tests and synthetic data.
    pub fn from_records(records: Vec<TrajectoryRecord>) -> Result<Self, Error> {
        Self::build(PathBuf::from("<records>"), records)
    }

    fn build(path: PathBuf, records: Vec<TrajectoryRecord>) -> Result<Self, Error> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut agent_ids = BTreeSet::new();

        let mut sorted = records;
        sorted.sort_by_key(|r| r.frame_id);

        for record in sorted {
            agent_ids.insert(record.agent_id);
            match frames.last_mut() {
                Some(frame) if frame.frame_id == record.frame_id => {
                    if frame.observations.iter().any(|(a, _, _)| *a == record.agent_id) {
                        return Err(Error::Parse {
                            path,
                            line: 0,
                            reason: format!(
                                "agent {} appears twice in frame {}",
                                record.agent_id, record.frame_id
                            ),
                        });
                    }
                    frame.observations.push((record.agent_id, record.x, record.y));
                }
                _ => frames.push(Frame {
                    frame_id: record.frame_id,
                    observations: vec![(record.agent_id, record.x, record.y)],
                }),
            }
        }

        Ok(FrameLog {
            path,
            frames,
            agent_ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_agents(&self) -> usize {
        self.agent_ids.len()
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.agent_ids.iter().copied()
    }
}

fn parse_line(line: &str, delimiter: char) -> Result<TrajectoryRecord, String> {
    let fields: Vec<&str> = line
        .split(delimiter)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() != 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }

    let frame_id = parse_id(fields[0])?;
    let agent_id = parse_id(fields[1])?;
    let x = fields[2]
        .parse::<f32>()
        .map_err(|_| format!("invalid x coordinate '{}'", fields[2]))?;
    let y = fields[3]
        .parse::<f32>()
        .map_err(|_| format!("invalid y coordinate '{}'", fields[3]))?;

    Ok(TrajectoryRecord {
        frame_id,
        agent_id,
        x,
        y,
    })
}

fn parse_id(field: &str) -> Result<i64, String> {
    field
        .parse::<f64>()
        .map(|v| v as i64)
        .map_err(|_| format!("invalid id '{}'", field))
}
