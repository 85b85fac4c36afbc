use {
    std::{
        collections::BTreeMap,
        env,
        fs::{
            self,
            File,
        },
        hash::{
            DefaultHasher,
            Hasher as _,
        },
        io::prelude::*,
        path::{
            Path,
            PathBuf,
        },
    },
    semver::Version,
};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)] Io(#[from] std::io::Error),
    #[error(transparent)] Semver(#[from] semver::Error),
    #[error("missing environment variable {0}")]
    Env(&'static str),
    #[error("non-UTF-8 static file path: {}", .0.display())]
    NonUtf8Path(PathBuf),
    #[error("package version {0} has pre-release or build metadata")]
    Version(Version),
}

fn check_static_file(cache: &mut BTreeMap<PathBuf, u64>, relative_path: &Path, path: PathBuf) -> Result<(), Error> {
    println!("cargo:rerun-if-changed={}", path.display());
    let mut hasher = DefaultHasher::default();
    hasher.write(&fs::read(&path)?);
    cache.insert(relative_path.to_owned(), hasher.finish());
    Ok(())
}

fn check_static_dir(cache: &mut BTreeMap<PathBuf, u64>, relative_path: &Path, path: PathBuf) -> Result<(), Error> {
    for entry in fs::read_dir(&path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            check_static_dir(cache, &relative_path.join(entry.file_name()), entry.path())?;
        } else {
            check_static_file(cache, &relative_path.join(entry.file_name()), entry.path())?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    let manifest_dir = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").ok_or(Error::Env("CARGO_MANIFEST_DIR"))?);
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or(Error::Env("OUT_DIR"))?);
    let static_dir = manifest_dir.join("assets").join("static");
    println!("cargo:rerun-if-changed={}", static_dir.display());
    let mut cache = BTreeMap::default();
    check_static_dir(&mut cache, Path::new(""), static_dir)?;
    let mut out_f = File::create(out_dir.join("static_files.rs"))?;
    writeln!(&mut out_f, "macro_rules! static_url {{")?;
    for (path, hash) in cache {
        let unix_path = path.to_str().ok_or_else(|| Error::NonUtf8Path(path.clone()))?.replace('\\', "/");
        let uri = format!("/static/{unix_path}?v={hash:016x}");
        writeln!(&mut out_f, "    ({unix_path:?}) => {{")?;
        writeln!(&mut out_f, "        ::rocket_util::Origin(::rocket::uri!({uri:?}))")?;
        writeln!(&mut out_f, "    }};")?;
    }
    writeln!(&mut out_f, "}}")?;
    let mut out_f = File::create(out_dir.join("version.rs"))?;
    let version = env!("CARGO_PKG_VERSION").parse::<Version>()?;
    if !version.pre.is_empty() || !version.build.is_empty() {
        return Err(Error::Version(version))
    }
    writeln!(&mut out_f, "pub const CLAP_VERSION: &str = {:?};", version.to_string())?;
    Ok(())
}
