use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::job::{ColumnPlacement, Job};
use crate::styles::{FillColor, apply_header_fill_detailed};
use crate::writer::{load_template, write_output, write_rows};

const JOB_FILE: &str = "sheetrows_job.json";
const USAGE: &str = "用法: sheetrows <模板.xlsx> <输出.xlsx> [任务.json] [--color RRGGBB] [--align-by-header]";

#[derive(Debug)]
struct Options {
    template: PathBuf,
    output: PathBuf,
    job: Option<PathBuf>,
    color: Option<String>,
    align_by_header: bool,
}

fn parse_args(args: impl IntoIterator<Item = OsString>) -> Result<Option<Options>> {
    let mut args = args.into_iter();
    let _exe = args.next();

    let mut positional = Vec::new();
    let mut color = None;
    let mut align_by_header = false;

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--color") => {
                let value = args.next().ok_or_else(|| anyhow!("--color 需要一个颜色值"))?;
                color = Some(value.to_string_lossy().into_owned());
            }
            Some("--align-by-header") => align_by_header = true,
            Some(flag) if flag.starts_with("--") => return Err(anyhow!("未知参数: {flag}")),
            _ => positional.push(PathBuf::from(&arg)),
        }
    }

    let mut positional = positional.into_iter();
    let (Some(template), Some(output)) = (positional.next(), positional.next()) else {
        return Ok(None);
    };
    let job = positional.next();
    if let Some(extra) = positional.next() {
        return Err(anyhow!("多余的参数: {}", extra.display()));
    }

    Ok(Some(Options {
        template,
        output,
        job,
        color,
        align_by_header,
    }))
}

fn load_job(path: Option<&Path>) -> Result<Job> {
    if let Some(path) = path {
        return Job::from_json_file(path)
            .with_context(|| format!("无法读取任务文件: {}", path.display()));
    }

    let default_path = Path::new(JOB_FILE);
    if default_path.exists() {
        Job::from_json_file(default_path)
            .with_context(|| format!("无法读取任务文件: {}", default_path.display()))
    } else {
        Ok(Job::sample())
    }
}

fn process(options: &Options) -> Result<()> {
    let mut job = load_job(options.job.as_deref())?;
    if let Some(color) = &options.color {
        job.fill = FillColor::parse(color).context("无效的 --color")?;
    }
    if options.align_by_header {
        job.placement = ColumnPlacement::HeaderAligned;
    }

    let template = load_template(&options.template)
        .with_context(|| format!("无法打开模板: {}", options.template.display()))?;
    let filled = write_rows(template, &job)
        .with_context(|| format!("无法写入数据: {}", options.template.display()))?;
    let (styled, report) = apply_header_fill_detailed(filled, &job.fill)
        .context("无法设置表头样式")?;
    write_output(&styled, &options.output)
        .with_context(|| format!("无法保存文件: {}", options.output.display()))?;

    println!(
        "已写入 {} 行数据，表头 {} 个单元格填充为 {}",
        job.records.len(),
        report.cells_styled,
        job.fill
    );
    println!("文件已保存为: {}", options.output.display());
    Ok(())
}

pub fn run(args: impl IntoIterator<Item = OsString>) -> Result<()> {
    let Some(options) = parse_args(args)? else {
        println!("{USAGE}");
        return Ok(());
    };
    process(&options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn parses_positionals_and_flags() {
        let options = parse_args(args(&[
            "sheetrows",
            "in.xlsx",
            "out.xlsx",
            "job.json",
            "--color",
            "ff0000",
            "--align-by-header",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(options.template, PathBuf::from("in.xlsx"));
        assert_eq!(options.output, PathBuf::from("out.xlsx"));
        assert_eq!(options.job, Some(PathBuf::from("job.json")));
        assert_eq!(options.color.as_deref(), Some("ff0000"));
        assert!(options.align_by_header);
    }

    #[test]
    fn too_few_arguments_means_usage() {
        assert!(parse_args(args(&["sheetrows", "in.xlsx"])).unwrap().is_none());
        assert!(run(args(&["sheetrows"])).is_ok());
    }

    #[test]
    fn rejects_unknown_flags_and_extras() {
        assert!(parse_args(args(&["sheetrows", "a", "b", "--bold"])).is_err());
        assert!(parse_args(args(&["sheetrows", "a", "b", "c", "d"])).is_err());
        assert!(parse_args(args(&["sheetrows", "a", "b", "--color"])).is_err());
    }

    #[test]
    fn missing_template_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.xlsx");
        let job = dir.path().join("job.json");
        std::fs::write(&job, r#"{"headers": {"A": "a"}}"#).unwrap();

        let err = run(vec![
            OsString::from("sheetrows"),
            dir.path().join("Sample.xlsx").into_os_string(),
            output.clone().into_os_string(),
            job.into_os_string(),
        ])
        .unwrap_err();

        assert!(format!("{err:#}").contains("template not found"));
        assert!(!output.exists());
    }
}
