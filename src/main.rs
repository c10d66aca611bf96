mod app;
mod config;
mod error;
mod scene;

use std::env;
use std::path::PathBuf;

use error::RenderError;
use scene::shader::ShaderKind;

const USAGE: &str = "usage: soft_raster [-c config.ron] [-o output.png] [-s darboux|phong] model.obj...";

fn flag_value(args: &[String], i: usize) -> Result<&String, RenderError> {
    return args
        .get(i + 1)
        .ok_or_else(|| RenderError::Config(format!("{} needs a value\n{}", args[i], USAGE)));
}

/// Reads command line arguments, program name excluded. `None` means only help was asked for.
fn parse_args(args: &[String]) -> Result<Option<app::Params>, RenderError> {
    let mut params = app::Params {
        config_path: None,
        output: None,
        shader: None,
        model_paths: Vec::new(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-c" => { params.config_path = Some(PathBuf::from(flag_value(args, i)?)); i += 1; }
            "-o" => { params.output = Some(PathBuf::from(flag_value(args, i)?)); i += 1; }
            "-s" => { params.shader = Some(flag_value(args, i)?.parse::<ShaderKind>()?); i += 1; }
            "-h" | "--help" => { return Ok(None); }
            flag if flag.starts_with('-') => {
                return Err(RenderError::Config(format!("unknown option {}\n{}", flag, USAGE)));
            }
            path => { params.model_paths.push(PathBuf::from(path)); }
        }
        i += 1;
    }
    return Ok(Some(params));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let params = match parse_args(&args)? {
        Some(params) => params,
        None => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    app::run(params)?;

    return Ok(());
}
