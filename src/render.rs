//! Presentation of an analysis report. Renderers consume the report as plain data,
//! so a chart backend could be plugged in by implementing `Render`.
use crate::analysis::Report;
use std::io::Write;

pub trait Render {
    fn render<W: Write>(&self, report: &Report, wtr: &mut W) -> std::io::Result<()>;
}

/// Tab separated tables, one section per result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tsv;

/// Pretty-printed JSON of the report.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Render for Tsv {
    fn render<W: Write>(&self, report: &Report, wtr: &mut W) -> std::io::Result<()> {
        let dataset = &report.dataset;
        writeln!(wtr, "# Frequencies")?;
        if let Some((_, table)) = report.panel.rows.first() {
            let header: Vec<_> = table
                .alphabet()
                .symbols()
                .iter()
                .map(|&s| (s as char).to_string())
                .collect();
            writeln!(wtr, "Phase\t{}", header.join("\t"))?;
        }
        for (phase, table) in report.panel.rows.iter() {
            let freqs: Vec<_> = table.iter().map(|(_, f)| format!("{:.3}", f)).collect();
            writeln!(wtr, "{}\t{}", phase, freqs.join("\t"))?;
        }
        writeln!(wtr, "# Candles\t{}", dataset.station)?;
        writeln!(wtr, "Label\tValue\tOpen\tHigh\tLow\tClose\tTone")?;
        for (label, c) in dataset.labels.iter().zip(report.candles.iter()) {
            writeln!(
                wtr,
                "{}\t{:.1}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:?}",
                label,
                c.value,
                c.open,
                c.high,
                c.low,
                c.close,
                c.tone()
            )?;
        }
        writeln!(wtr, "# RegimeShift")?;
        write!(wtr, "{}", report.regime_shift)?;
        writeln!(wtr, "# Model")?;
        writeln!(
            wtr,
            "Iterations\t{}\tLK\t{:.4}\tConverged\t{}",
            report.fit.iterations, report.fit.log_likelihood, report.fit.converged
        )?;
        let model = &report.model;
        for (s, (mean, var)) in model.means.iter().zip(model.variances.iter()).enumerate() {
            let transitions: Vec<_> = model.transition_matrix[s]
                .iter()
                .map(|x| format!("{:.3}", x))
                .collect();
            writeln!(
                wtr,
                "State{}\t{:.3}\t{:.3}\t{:.3}\t{}",
                s,
                mean,
                var,
                model.initial_distribution[s],
                transitions.join("\t")
            )?;
        }
        writeln!(wtr, "# States")?;
        writeln!(wtr, "Label\tValue\tDrought\tState")?;
        let droughts = dataset.droughts();
        for (((label, value), drought), state) in dataset
            .labels
            .iter()
            .zip(dataset.values.iter())
            .zip(droughts.iter())
            .zip(report.states.iter())
        {
            writeln!(wtr, "{}\t{:.1}\t{}\t{}", label, value, drought, state)?;
        }
        Ok(())
    }
}

impl Render for Json {
    fn render<W: Write>(&self, report: &Report, wtr: &mut W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *wtr, report)?;
        writeln!(wtr)
    }
}
