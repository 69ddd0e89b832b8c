//! Command-line front end for the archive, tree, and resolver helpers.
//!
//! Every subcommand maps onto one library call. A helper that reports
//! failure through `false` turns into a non-zero exit with a short message so
//! shell callers can check `$?` instead of parsing output.

use anyhow::{Context, Result, anyhow, bail};
use corekit::{
    Config, FileTree, Kind, NameResolver, Scope, Selector, TypeRegistry, archive, split_list,
    tree,
};
use std::env;
use std::path::PathBuf;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = env::args_os()
        .skip(1)
        .map(|arg| {
            arg.into_string()
                .map_err(|_| anyhow!("arguments must be valid Unicode"))
        })
        .collect::<Result<Vec<_>>>()?;
    let invocation = parse_args(&args)?;
    let config = Config::discover(invocation.config.as_deref())?;

    match invocation.command {
        Command::Help => print!("{}", usage()),
        Command::ZipCreate {
            source,
            destination,
            skip,
        } => {
            let skip = skip.unwrap_or_else(|| config.archive.skip_names.clone());
            if !archive::create(&source, &destination, Some(&skip)) {
                bail!("Unable to create archive {}", destination.display());
            }
        }
        Command::ZipExtract {
            archive: path,
            destination,
            selector,
        } => {
            let file_tree = FileTree::from_settings(&config.tree);
            let extracted = archive::extract_with(&path, &destination, &selector, &file_tree)?;
            if !extracted {
                bail!(
                    "Unable to extract {} into {}",
                    path.display(),
                    destination.display()
                );
            }
        }
        Command::ZipList(path) => {
            let entries = archive::list_entries(&path)
                .with_context(|| format!("Unable to open archive {}", path.display()))?;
            for entry in entries {
                println!("{entry}");
            }
        }
        Command::ZipCheck(path) => {
            let status = archive::inspect(&path);
            match status.message() {
                Some(message) => bail!("{}: {message}", path.display()),
                None => println!("{}: ok", path.display()),
            }
        }
        Command::TreeCopy {
            from,
            to,
            overwrite,
        } => {
            let report = FileTree::from_settings(&config.tree).copy_report(&from, &to, overwrite);
            if !report.success() {
                for failure in report.failures() {
                    eprintln!(
                        "{}: {}",
                        failure.path.display(),
                        failure.error.as_deref().unwrap_or("failed")
                    );
                }
                bail!("Copy from {} to {} incomplete", from.display(), to.display());
            }
        }
        Command::TreeDelete(path) => {
            if !FileTree::from_settings(&config.tree).delete_directory(&path) {
                bail!("Unable to fully delete {}", path.display());
            }
        }
        Command::TreeEmpty(path) => {
            println!("{}", tree::is_empty(&path));
        }
        Command::Resolve { kind, name, scope } => {
            let resolver = NameResolver::from_config(&config, TypeRegistry::new());
            println!("{}", resolver.resolve(&scope, &name, kind));
        }
    }
    Ok(())
}

struct Invocation {
    config: Option<PathBuf>,
    command: Command,
}

enum Command {
    ZipCreate {
        source: PathBuf,
        destination: PathBuf,
        skip: Option<Vec<String>>,
    },
    ZipExtract {
        archive: PathBuf,
        destination: PathBuf,
        selector: Selector,
    },
    ZipList(PathBuf),
    ZipCheck(PathBuf),
    TreeCopy {
        from: PathBuf,
        to: PathBuf,
        overwrite: bool,
    },
    TreeDelete(PathBuf),
    TreeEmpty(PathBuf),
    Resolve {
        kind: Kind,
        name: String,
        scope: Scope,
    },
    Help,
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut config = None;
    let mut rest: Vec<&str> = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let Some(path) = iter.next() else {
                bail!("--config expects a path");
            };
            config = Some(PathBuf::from(path));
        } else {
            rest.push(arg.as_str());
        }
    }

    let command = match rest.as_slice() {
        [] => bail!(usage()),
        ["--help"] | ["-h"] | ["help"] => Command::Help,
        ["zip", "create", source, destination, options @ ..] => Command::ZipCreate {
            source: PathBuf::from(source),
            destination: PathBuf::from(destination),
            skip: parse_skip(options)?,
        },
        ["zip", "extract", archive, destination, options @ ..] => Command::ZipExtract {
            archive: PathBuf::from(archive),
            destination: PathBuf::from(destination),
            selector: parse_selector(options)?,
        },
        ["zip", "list", archive] => Command::ZipList(PathBuf::from(archive)),
        ["zip", "check", archive] => Command::ZipCheck(PathBuf::from(archive)),
        ["tree", "copy", from, to, options @ ..] => Command::TreeCopy {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
            overwrite: match options {
                [] => true,
                ["--no-overwrite"] => false,
                _ => bail!("tree copy accepts only --no-overwrite"),
            },
        },
        ["tree", "delete", path] => Command::TreeDelete(PathBuf::from(path)),
        ["tree", "empty", path] => Command::TreeEmpty(PathBuf::from(path)),
        ["resolve", kind, name, options @ ..] => Command::Resolve {
            kind: Kind::try_from(*kind)?,
            name: name.to_string(),
            scope: parse_scope(options)?,
        },
        [other, ..] => bail!("Unknown or incomplete command: {other}\n\n{}", usage()),
    };

    Ok(Invocation { config, command })
}

fn parse_skip(options: &[&str]) -> Result<Option<Vec<String>>> {
    match options {
        [] => Ok(None),
        ["--skip", list] => Ok(Some(split_list(list))),
        _ => bail!("zip create accepts only --skip <names>"),
    }
}

fn parse_selector(options: &[&str]) -> Result<Selector> {
    match options {
        [] => Ok(Selector::All),
        ["--index", index] => {
            let index = index
                .parse::<usize>()
                .with_context(|| format!("--index expects a number, got {index}"))?;
            Ok(Selector::Index(index))
        }
        _ => {
            let mut names = Vec::new();
            let mut iter = options.iter();
            while let Some(option) = iter.next() {
                match (*option, iter.next()) {
                    ("--name", Some(name)) => names.push(name.to_string()),
                    _ => bail!("zip extract accepts --index <n> or one or more --name <entry>"),
                }
            }
            Ok(Selector::Names(names))
        }
    }
}

fn parse_scope(options: &[&str]) -> Result<Scope> {
    match options {
        [] => Ok(Scope::Core),
        ["--extension", name] => Ok(Scope::extension(Some(*name))),
        ["--module", name] => Ok(Scope::module(Some(*name))),
        _ => bail!("resolve accepts --extension <name> or --module <name>"),
    }
}

fn usage() -> &'static str {
    "Usage: corekit [--config <path>] <command>\n\nCommands:\n  zip create <source> <dest> [--skip <names>]      Zip a file or directory tree.\n  zip extract <archive> <dest> [--index <n> | --name <entry>...]\n                                                   Extract all or selected entries.\n  zip list <archive>                               Print entry names in index order.\n  zip check <archive>                              Run a full consistency check.\n  tree copy <from> <to> [--no-overwrite]           Copy a file, symlink, or tree.\n  tree delete <path>                               Delete a directory tree.\n  tree empty <path>                                Print whether a directory is empty.\n  resolve <kind> <name> [--extension <n> | --module <n>]\n                                                   Print the fully-qualified identifier.\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_resolve_with_extension_scope() {
        let invocation =
            parse_args(&strings(&["resolve", "model", "Post", "--extension", "blog"])).unwrap();
        match invocation.command {
            Command::Resolve { kind, name, scope } => {
                assert_eq!(kind, Kind::Model);
                assert_eq!(name, "Post");
                assert_eq!(scope, Scope::Extension("blog".into()));
            }
            _ => panic!("expected resolve command"),
        }
    }

    #[test]
    fn parses_extract_selectors() {
        let by_index =
            parse_args(&strings(&["zip", "extract", "a.zip", "out", "--index", "2"])).unwrap();
        assert!(matches!(
            by_index.command,
            Command::ZipExtract { selector: Selector::Index(2), .. }
        ));

        let by_name = parse_args(&strings(&[
            "--config", "c.json", "zip", "extract", "a.zip", "out", "--name", "x", "--name", "y",
        ]))
        .unwrap();
        assert_eq!(by_name.config, Some(PathBuf::from("c.json")));
        match by_name.command {
            Command::ZipExtract { selector, .. } => {
                assert_eq!(selector, Selector::Names(vec!["x".into(), "y".into()]))
            }
            _ => panic!("expected extract command"),
        }
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(parse_args(&strings(&["zip", "shred", "a.zip"])).is_err());
        assert!(parse_args(&strings(&["tree", "copy", "a", "b", "--force"])).is_err());
        assert!(parse_args(&[]).is_err());
    }
}
