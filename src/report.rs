use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;

use super::error::Result;
use super::matrix::ZoneMatrix;
use super::network::EdgeLoad;


const BAR_WIDTH: usize = 50;

pub enum Report {
    ModalSplit {
        scenario: String,
        split: Vec<(String, f64)>,
    },
    ModalTrips {
        scenario: String,
        mode: String,
        trips: ZoneMatrix,
    },
    LoadedNetwork {
        scenario: String,
        mode: String,
        edges: Vec<EdgeLoad>,
        stranded_volume: f64,
    },
}

pub struct Reporter {
    sender: Sender<Report>,
    handle: JoinHandle<usize>,
}

impl Reporter {
    /// Starts the reporting thread, which writes everything it receives under `out_dir`.
    pub fn spawn(out_dir: &Path) -> Result<Reporter> {
        std::fs::create_dir_all(out_dir)?;
        let (sender, receiver) = channel();
        let out_dir = PathBuf::from(out_dir);
        let handle = std::thread::spawn(move || render_all(&out_dir, receiver));
        Ok(Reporter{sender, handle})
    }

    /// Queues a report.  Never blocks.
    pub fn submit(&self, report: Report) {
        if self.sender.send(report).is_err() {
            log::warn!("reporting thread has stopped; dropping report");
        }
    }

    /// Closes the queue and waits for pending reports to be written.  Returns how many were
    /// written successfully.
    pub fn finish(self) -> usize {
        let Reporter{sender, handle} = self;
        drop(sender);
        match handle.join() {
            Ok(num_written) => num_written,
            Err(_) => {
                log::error!("reporting thread panicked");
                0
            }
        }
    }
}

fn render_all(out_dir: &Path, receiver: Receiver<Report>) -> usize {
    let mut num_written = 0;
    for report in receiver {
        match render(out_dir, &report) {
            Ok(()) => num_written += 1,
            Err(err) => log::error!("failed to write report: {}", err),
        }
    }
    num_written
}

fn render(out_dir: &Path, report: &Report) -> Result<()> {
    match report {
        Report::ModalSplit{scenario, split} => {
            let path = out_dir.join(format!("modal_split_{}.csv", slug(scenario)));
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(&["mode", "share"])?;
            for (mode, share) in split {
                writer.write_record(&[mode.clone(), share.to_string()])?;
            }
            writer.flush()?;

            let path = out_dir.join(format!("modal_split_{}.txt", slug(scenario)));
            let mut file = File::create(&path)?;
            file.write_all(bar_chart(scenario, split).as_bytes())?;
        }
        Report::ModalTrips{scenario, mode, trips} => {
            let path = out_dir.join(format!("trips_{}_{}.csv", slug(scenario), slug(mode)));
            trips.write_csv(&path)?;
        }
        Report::LoadedNetwork{scenario, mode, edges, stranded_volume} => {
            let path = out_dir.join(format!("loads_{}_{}.csv", slug(scenario), slug(mode)));
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(&["from_id", "from_name", "to_id", "to_name", "distance_km",
                                  "volume"])?;
            for edge in edges {
                writer.write_record(&[
                    edge.from_id.to_string(),
                    edge.from_name.clone(),
                    edge.to_id.to_string(),
                    edge.to_name.clone(),
                    edge.distance_km.to_string(),
                    edge.volume.to_string(),
                ])?;
            }
            writer.flush()?;
            if *stranded_volume > 0. {
                log::warn!("{} / {}: {} trips could not be routed", scenario, mode,
                           stranded_volume);
            }
        }
    }
    Ok(())
}

/// Lower-case file-name-safe version of a name.
pub fn slug(name: &str) -> String {
    let slug: String = name.chars()
        .map(|cc| if cc.is_ascii_alphanumeric() { cc.to_ascii_lowercase() } else { '_' })
        .collect();
    slug.trim_matches('_').to_string()
}

/// A horizontal text bar chart of the modal split.
pub fn bar_chart(title: &str, split: &[(String, f64)]) -> String {
    let label_width = split.iter().map(|(mode, _)| mode.len()).max().unwrap_or(0);
    let mut chart = format!("{}\n", title);
    for (mode, share) in split {
        let bar_len = (share.max(0.).min(1.) * BAR_WIDTH as f64).round() as usize;
        chart.push_str(&format!("{:width$} | {:<bar$} {:5.1}%\n", mode, "#".repeat(bar_len),
                                share * 100., width=label_width, bar=BAR_WIDTH));
    }
    chart
}
