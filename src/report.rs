// src/report.rs
//
// Text rendering of correction reports and the append-only report file.
//
// Layout per processed sample:
//   <blank line>
//   === <title> (t=…s) ===
//   status / environment / four correction subsections / diagnostics
//   <blank line>
//   ================================================================================
//   <blank line>
//
// Rendering is a pure function of the report and the locale so the format
// can be tested (and swapped) without running the pipeline.

use crate::correction::{CompassDirection, CorrectionReport, DeviationStatus};
use crate::error::{self, PipelineError};
use crate::types::ReportLocale;
use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const RULE_WIDTH: usize = 80;

struct Labels {
    banner: &'static str,
    title: &'static str,
    status: &'static str,
    similarity: &'static str,
    key_parameters: &'static str,
    altitude: &'static str,
    velocity: &'static str,
    wind: &'static str,
    pressure: &'static str,
    temperature: &'static str,
    meters: &'static str,
    meters_per_second: &'static str,
    recommendations: &'static str,
    yaw_heading: &'static str,
    angle: &'static str,
    direction: &'static str,
    rationale: &'static str,
    flow_vector: &'static str,
    roll_heading: &'static str,
    correction: &'static str,
    horizon_tilt: &'static str,
    pitch_heading: &'static str,
    altitude_speed: &'static str,
    wind_heading: &'static str,
    offset: &'static str,
    metrics: &'static str,
    flow_magnitude: &'static str,
    std_x: &'static str,
    std_y: &'static str,
    velocity_vector: &'static str,
    wind_vector: &'static str,
    statuses: [&'static str; 4],
    compass: [&'static str; 8],
}

const EN: Labels = Labels {
    banner: "DETAILED TRAJECTORY CORRECTION RECOMMENDATIONS",
    title: "Trajectory analysis",
    status: "Status",
    similarity: "similarity",
    key_parameters: "Key parameters:",
    altitude: "Altitude",
    velocity: "Velocity",
    wind: "Wind",
    pressure: "Pressure",
    temperature: "Temperature",
    meters: "m",
    meters_per_second: "m/s",
    recommendations: "Correction recommendations:",
    yaw_heading: "1. Yaw:",
    angle: "Angle",
    direction: "Direction",
    rationale: "Rationale",
    flow_vector: "Optical flow vector",
    roll_heading: "2. Roll:",
    correction: "Correction",
    horizon_tilt: "Horizon tilt",
    pitch_heading: "3. Pitch:",
    altitude_speed: "Altitude/velocity",
    wind_heading: "4. Wind compensation:",
    offset: "Offset",
    metrics: "Additional metrics:",
    flow_magnitude: "Flow magnitude",
    std_x: "Standard deviation X",
    std_y: "Standard deviation Y",
    velocity_vector: "UAV velocity vector",
    wind_vector: "Wind vector",
    statuses: [
        "Normal deviation",
        "Moderate deviation",
        "Significant deviation",
        "CRITICAL DEVIATION",
    ],
    compass: ["N", "NE", "E", "SE", "S", "SW", "W", "NW"],
};

// Matches the recorded field logs, including the trailing spaces after
// the first three subsection headings.
const RU: Labels = Labels {
    banner: "ДЕТАЛИЗИРОВАННЫЕ РЕКОМЕНДАЦИИ ПО КОРРЕКЦИИ ТРАЕКТОРИИ",
    title: "Анализ траектории",
    status: "Статус",
    similarity: "схожесть",
    key_parameters: "Основные параметры:",
    altitude: "Высота",
    velocity: "Скорость",
    wind: "Ветер",
    pressure: "Давление",
    temperature: "Температура",
    meters: "м",
    meters_per_second: "м/с",
    recommendations: "Рекомендации по коррекции:",
    yaw_heading: "1. Рыскание (Yaw): ",
    angle: "Угол",
    direction: "Направление",
    rationale: "Обоснование",
    flow_vector: "Вектор оптического потока",
    roll_heading: "2. Крен (Roll): ",
    correction: "Коррекция",
    horizon_tilt: "Наклон горизонта",
    pitch_heading: "3. Тангаж (Pitch): ",
    altitude_speed: "Высота/скорость",
    wind_heading: "4. Ветровая коррекция:",
    offset: "Смещение",
    metrics: "Дополнительные метрики:",
    flow_magnitude: "Магнитуда потока",
    std_x: "Стандартное отклонение X",
    std_y: "Стандартное отклонение Y",
    velocity_vector: "Вектор скорости БЛА",
    wind_vector: "Вектор ветра",
    statuses: [
        "Нормальное отклонение",
        "Умеренное отклонение",
        "Значительное отклонение",
        "КРИТИЧЕСКОЕ ОТКЛОНЕНИЕ",
    ],
    compass: ["С", "СВ", "В", "ЮВ", "Ю", "ЮЗ", "З", "СЗ"],
};

fn labels(locale: ReportLocale) -> &'static Labels {
    match locale {
        ReportLocale::En => &EN,
        ReportLocale::Ru => &RU,
    }
}

pub fn status_label(status: DeviationStatus, locale: ReportLocale) -> &'static str {
    let index = match status {
        DeviationStatus::Normal => 0,
        DeviationStatus::Moderate => 1,
        DeviationStatus::Significant => 2,
        DeviationStatus::Critical => 3,
    };
    labels(locale).statuses[index]
}

pub fn compass_label(direction: CompassDirection, locale: ReportLocale) -> &'static str {
    labels(locale).compass[direction.index()]
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Banner written once at the top of a fresh report file
pub fn render_header(locale: ReportLocale) -> String {
    format!("{}\n{}\n\n", labels(locale).banner, rule())
}

/// Rule line closing every report block
pub fn block_separator() -> String {
    format!("\n{}\n\n", rule())
}

/// One report block, without the closing rule
pub fn render(report: &CorrectionReport, locale: ReportLocale) -> String {
    ReportBlock { report, locale }.to_string()
}

struct ReportBlock<'a> {
    report: &'a CorrectionReport,
    locale: ReportLocale,
}

impl fmt::Display for ReportBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (report, locale) = (self.report, self.locale);
        let l = labels(locale);
        let env = &report.environment;
        let v = &report.velocity_vector;
        let w = &report.wind_vector;
        let (m, mps) = (l.meters, l.meters_per_second);

        writeln!(f)?;
        writeln!(f, "=== {} (t={:.1}s) ===", l.title, report.timestamp)?;
        writeln!(
            f,
            "{}: {} ({}: {:.2}%)",
            l.status,
            status_label(report.status, locale),
            l.similarity,
            report.similarity
        )?;
        writeln!(f, "{}", l.key_parameters)?;
        writeln!(
            f,
            "  {}: {:.1} {} | {}: {:.1} {}",
            l.altitude, env.altitude, m, l.velocity, env.velocity, mps
        )?;
        writeln!(
            f,
            "  {}: {:.1} {} ({:.1}°) | {}: {:.1} hPa | {}: {:.1}°C",
            l.wind,
            env.wind_speed,
            mps,
            env.wind_direction,
            l.pressure,
            env.pressure,
            l.temperature,
            env.temperature
        )?;
        writeln!(f)?;

        writeln!(f, "{}", l.recommendations)?;
        writeln!(f, "{}", l.yaw_heading)?;
        writeln!(f, "   - {}: {:.2}°", l.angle, report.yaw_correction)?;
        writeln!(
            f,
            "   - {}: {}",
            l.direction,
            compass_label(report.yaw_direction, locale)
        )?;
        writeln!(
            f,
            "   - {}: {} ({:.1}°)",
            l.rationale, l.flow_vector, report.flow_angle
        )?;
        writeln!(f)?;

        writeln!(f, "{}", l.roll_heading)?;
        writeln!(f, "   - {}: {:.2}°", l.correction, report.roll_correction)?;
        writeln!(
            f,
            "   - {}: {} ({:.1}°)",
            l.rationale, l.horizon_tilt, report.horizon_angle
        )?;
        writeln!(f)?;

        writeln!(f, "{}", l.pitch_heading)?;
        writeln!(f, "   - {}: {:.2}°", l.correction, report.pitch_correction)?;
        writeln!(
            f,
            "   - {}: {} (V={:.1} {}, H={:.1} {})",
            l.rationale, l.altitude_speed, env.velocity, mps, env.altitude, m
        )?;
        writeln!(f)?;

        writeln!(f, "{}", l.wind_heading)?;
        writeln!(f, "   - {}: {:.2}°", l.offset, report.wind_correction)?;
        writeln!(
            f,
            "   - {}: {} {:.1} {}",
            l.rationale, l.wind, env.wind_speed, mps
        )?;
        writeln!(f)?;

        writeln!(f, "{}", l.metrics)?;
        writeln!(f, "- {}: {:.4}", l.flow_magnitude, report.flow_magnitude)?;
        writeln!(f, "- {}: {:.4}", l.std_x, report.flow_std_x)?;
        writeln!(f, "- {}: {:.4}", l.std_y, report.flow_std_y)?;
        writeln!(
            f,
            "- {}: X={:.2}, Y={:.2}, Z={:.2} {}",
            l.velocity_vector, v.x, v.y, v.z, mps
        )?;
        writeln!(
            f,
            "- {}: X={:.2}, Y={:.2}, Z={:.2} {}",
            l.wind_vector, w.x, w.y, w.z, mps
        )?;
        Ok(())
    }
}

// ============================================================================
// REPORT FILE
// ============================================================================

/// Append-only sink for one run. Creating it truncates the target and
/// writes the banner; each block goes out in a single write so a crash
/// leaves only complete blocks behind.
pub struct ReportWriter {
    path: PathBuf,
    file: File,
    jsonl: Option<(PathBuf, File)>,
    locale: ReportLocale,
    blocks_written: usize,
}

impl ReportWriter {
    /// The JSON-lines sink is opened first so a bad mirror path leaves
    /// an existing text report untouched.
    pub fn create(
        path: &Path,
        jsonl_path: Option<&Path>,
        locale: ReportLocale,
    ) -> error::Result<Self> {
        let jsonl = match jsonl_path {
            Some(p) => {
                let file = File::create(p).map_err(|e| PipelineError::report_write(p, e))?;
                Some((p.to_path_buf(), file))
            }
            None => None,
        };

        let mut file = File::create(path).map_err(|e| PipelineError::report_write(path, e))?;
        file.write_all(render_header(locale).as_bytes())
            .map_err(|e| PipelineError::report_write(path, e))?;

        info!("💾 Report will be written to: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
            jsonl,
            locale,
            blocks_written: 0,
        })
    }

    /// Append one block. The structured mirror is best effort.
    pub fn append(&mut self, report: &CorrectionReport) -> Result<()> {
        let mut block = render(report, self.locale);
        block.push_str(&block_separator());

        self.file
            .write_all(block.as_bytes())
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        self.blocks_written += 1;

        if let Some((path, file)) = self.jsonl.as_mut() {
            let written = serde_json::to_string(report)
                .map_err(anyhow::Error::from)
                .and_then(|line| Ok(writeln!(file, "{}", line)?));
            if let Err(e) = written {
                warn!("Failed to append JSON record to {}: {}", path.display(), e);
            }
        }

        Ok(())
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::synthesize;
    use crate::environment::EnvironmentSnapshot;
    use crate::motion::MotionSummary;

    fn sample_report() -> CorrectionReport {
        let motion = MotionSummary {
            magnitude: 1.23456,
            angle: 10.0,
            mean_x: 1.2,
            mean_y: 0.2,
            std_x: 0.5,
            std_y: 0.25,
            measured: true,
        };
        synthesize(87.654, &motion, &EnvironmentSnapshot::at(0.0), 0.0, 2.0)
    }

    #[test]
    fn test_header_layout() {
        let header = render_header(ReportLocale::Ru);
        assert_eq!(
            header,
            format!(
                "ДЕТАЛИЗИРОВАННЫЕ РЕКОМЕНДАЦИИ ПО КОРРЕКЦИИ ТРАЕКТОРИИ\n{}\n\n",
                "=".repeat(80)
            )
        );
    }

    #[test]
    fn test_render_ru_matches_recorded_layout() {
        let text = render(&sample_report(), ReportLocale::Ru);
        let expected = "
=== Анализ траектории (t=0.0s) ===
Статус: Нормальное отклонение (схожесть: 87.65%)
Основные параметры:
  Высота: 100.0 м | Скорость: 22.0 м/с
  Ветер: 8.0 м/с (45.0°) | Давление: 1003.0 hPa | Температура: 25.0°C

Рекомендации по коррекции:
1. Рыскание (Yaw):\x20
   - Угол: -1.23°
   - Направление: С
   - Обоснование: Вектор оптического потока (10.0°)

2. Крен (Roll):\x20
   - Коррекция: -1.40°
   - Обоснование: Наклон горизонта (2.0°)

3. Тангаж (Pitch):\x20
   - Коррекция: 0.36°
   - Обоснование: Высота/скорость (V=22.0 м/с, H=100.0 м)

4. Ветровая коррекция:
   - Смещение: 0.42°
   - Обоснование: Ветер 8.0 м/с

Дополнительные метрики:
- Магнитуда потока: 1.2346
- Стандартное отклонение X: 0.5000
- Стандартное отклонение Y: 0.2500
- Вектор скорости БЛА: X=22.00, Y=0.00, Z=0.00 м/с
- Вектор ветра: X=5.66, Y=5.66, Z=0.00 м/с
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_ru_first_sample_without_flow() {
        let report = synthesize(
            87.65,
            &MotionSummary::default(),
            &EnvironmentSnapshot::at(0.0),
            0.0,
            0.0,
        );
        let text = render(&report, ReportLocale::Ru);
        let expected = "
=== Анализ траектории (t=0.0s) ===
Статус: Нормальное отклонение (схожесть: 87.65%)
Основные параметры:
  Высота: 100.0 м | Скорость: 22.0 м/с
  Ветер: 8.0 м/с (45.0°) | Давление: 1003.0 hPa | Температура: 25.0°C

Рекомендации по коррекции:
1. Рыскание (Yaw):\x20
   - Угол: 0.00°
   - Направление: С
   - Обоснование: Вектор оптического потока (0.0°)

2. Крен (Roll):\x20
   - Коррекция: -0.00°
   - Обоснование: Наклон горизонта (0.0°)

3. Тангаж (Pitch):\x20
   - Коррекция: 0.36°
   - Обоснование: Высота/скорость (V=22.0 м/с, H=100.0 м)

4. Ветровая коррекция:
   - Смещение: 0.00°
   - Обоснование: Ветер 8.0 м/с

Дополнительные метрики:
- Магнитуда потока: 0.0000
- Стандартное отклонение X: 0.0000
- Стандартное отклонение Y: 0.0000
- Вектор скорости БЛА: X=22.00, Y=0.00, Z=0.00 м/с
- Вектор ветра: X=5.66, Y=5.66, Z=0.00 м/с
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_en_structure() {
        let text = render(&sample_report(), ReportLocale::En);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "=== Trajectory analysis (t=0.0s) ===");
        assert_eq!(lines[2], "Status: Normal deviation (similarity: 87.65%)");
        assert!(text.contains("   - Direction: N\n"));
        assert!(text.contains("4. Wind compensation:\n"));
        assert!(text.ends_with("- Wind vector: X=5.66, Y=5.66, Z=0.00 m/s\n"));
        assert_eq!(
            lines.len(),
            render(&sample_report(), ReportLocale::Ru).lines().count()
        );
    }

    #[test]
    fn test_writer_truncates_and_appends_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "stale content from an older run\n").unwrap();

        let mut writer = ReportWriter::create(&path, None, ReportLocale::En).unwrap();
        writer.append(&sample_report()).unwrap();
        writer.append(&sample_report()).unwrap();
        assert_eq!(writer.blocks_written(), 2);
        drop(writer);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale content"));
        assert!(contents.starts_with(&render_header(ReportLocale::En)));
        assert_eq!(contents.matches("=== Trajectory analysis").count(), 2);
        assert!(contents.ends_with(&block_separator()));
    }

    #[test]
    fn test_bad_jsonl_path_leaves_report_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let jsonl = dir.path().join("missing_dir").join("report.jsonl");
        std::fs::write(&path, "previous run\n").unwrap();

        let err = ReportWriter::create(&path, Some(&jsonl), ReportLocale::Ru)
            .err()
            .unwrap();
        assert!(err.to_string().contains("report.jsonl"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous run\n");
    }

    #[test]
    fn test_jsonl_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let jsonl = dir.path().join("report.jsonl");

        let mut writer = ReportWriter::create(&path, Some(&jsonl), ReportLocale::Ru).unwrap();
        writer.append(&sample_report()).unwrap();
        drop(writer);

        let contents = std::fs::read_to_string(&jsonl).unwrap();
        let records: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["status"], "Normal");
        assert_eq!(records[0]["yaw_direction"], "N");
    }
}
