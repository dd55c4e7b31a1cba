use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, bail, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gansr::core::training::{CheckpointStore, ImageStream, Trainer};
use gansr::{scale_file, Codebook, GansrConfig, LanczosResidualTransform};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    env_logger::init();

    let matches = Command::new("GANSR")
        .version(env!("CARGO_PKG_VERSION"))
        .about("코드북 양자화 기반 2배 이미지 업스케일러")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .global(true)
                .help("JSON 설정 파일 (없으면 기본값)"),
        )
        .arg(
            Arg::new("checkpoints")
                .long("checkpoints")
                .value_name("DIR")
                .global(true)
                .default_value("./checkpoints")
                .help("체크포인트 디렉토리"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .global(true)
                .value_parser(value_parser!(u64))
                .help("난수 시드"),
        )
        .subcommand(
            Command::new("train")
                .about("이미지 디렉토리로 코드북 학습")
                .arg(
                    Arg::new("data")
                        .required(true)
                        .help("학습용 PNG 이미지 디렉토리"),
                )
                .arg(
                    Arg::new("max-steps")
                        .long("max-steps")
                        .value_name("STEPS")
                        .value_parser(value_parser!(u64))
                        .help("최대 학습 스텝 (없으면 무한)"),
                )
                .arg(
                    Arg::new("batch-size")
                        .long("batch-size")
                        .short('b')
                        .value_name("SIZE")
                        .value_parser(value_parser!(usize))
                        .help("미니배치 크기"),
                )
                .arg(
                    Arg::new("learning-rate")
                        .long("learning-rate")
                        .value_name("LR")
                        .value_parser(value_parser!(f32))
                        .help("코드북 학습률"),
                )
                .arg(
                    Arg::new("fresh")
                        .long("fresh")
                        .action(ArgAction::SetTrue)
                        .help("기존 체크포인트를 무시하고 처음부터 학습"),
                ),
        )
        .subcommand(
            Command::new("scale")
                .about("이미지를 2배로 확대")
                .arg(
                    Arg::new("inputs")
                        .required(true)
                        .num_args(1..)
                        .help("입력 이미지 파일들"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("FILE")
                        .help("출력 파일 (입력이 하나일 때만, 기본값 <이름>_scaled.png)"),
                )
                .arg(
                    Arg::new("tile-size")
                        .long("tile-size")
                        .value_name("PIXELS")
                        .value_parser(value_parser!(usize))
                        .help("타일 크기"),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .short('p')
                        .action(ArgAction::SetTrue)
                        .help("타일을 병렬로 처리"),
                )
                .arg(
                    Arg::new("crop")
                        .long("crop")
                        .action(ArgAction::SetTrue)
                        .help("결과를 원본의 정확히 2배 크기로 자르기"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("최신 체크포인트 정보 확인"),
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("train", sub_matches)) => handle_train(sub_matches),
        Some(("scale", sub_matches)) => handle_scale(sub_matches),
        Some(("info", sub_matches)) => handle_info(sub_matches),
        _ => {
            println!("❌ 명령을 지정해주세요. --help를 참조하세요.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("❌ 오류: {:#}", e);
        process::exit(1);
    }
}

fn load_config(matches: &ArgMatches) -> Result<GansrConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => GansrConfig::from_json_file(Path::new(path)),
        None => Ok(GansrConfig::default()),
    }
}

fn checkpoint_store(matches: &ArgMatches, config: &GansrConfig) -> Result<CheckpointStore> {
    let dir = matches
        .get_one::<String>("checkpoints")
        .ok_or_else(|| anyhow!("체크포인트 디렉토리가 필요합니다"))?;
    CheckpointStore::new(dir, config.training.max_to_keep)
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let mut config = load_config(matches)?;
    if let Some(&max_steps) = matches.get_one::<u64>("max-steps") {
        config.training.max_steps = Some(max_steps);
    }
    if let Some(&batch_size) = matches.get_one::<usize>("batch-size") {
        config.training.batch_size = batch_size;
    }
    if let Some(&learning_rate) = matches.get_one::<f32>("learning-rate") {
        config.training.learning_rate = learning_rate;
    }
    config.validate()?;

    let data = PathBuf::from(
        matches
            .get_one::<String>("data")
            .ok_or_else(|| anyhow!("학습 데이터 디렉토리가 필요합니다"))?,
    );
    let seed = matches.get_one::<u64>("seed").copied();
    let store = checkpoint_store(matches, &config)?;

    println!("🏋️ 코드북 학습 시작:");
    println!("   데이터: {}", data.display());
    println!("   체크포인트: {}", store.dir().display());
    println!(
        "   코드북: {}×{}, 배치 {}, 크롭 {}",
        config.quantizer.codebook_size,
        config.quantizer.latent_dim,
        config.training.batch_size,
        config.training.crop_size
    );

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let codebook = Codebook::random_normal(config.quantizer.codebook_size, config.quantizer.latent_dim, &mut rng)?;
    let transform = LanczosResidualTransform::new(config.quantizer.latent_dim)?;
    let mut trainer = Trainer::new(transform, codebook, config.training.clone(), seed)?;

    if !matches.get_flag("fresh") {
        trainer.resume_from(&store)?;
    }

    let stream = ImageStream::from_directory(&data, config.training.prefetch, seed)?;
    let last_step = trainer.run(&stream, Some(&store))?;

    println!("\n🏆 학습 완료: {} 스텝", last_step);
    println!("   코드북 분산: {:.4}", trainer.codebook().spread());
    Ok(())
}

fn handle_scale(matches: &ArgMatches) -> Result<()> {
    let mut config = load_config(matches)?;
    if let Some(&tile_size) = matches.get_one::<usize>("tile-size") {
        config.tile.tile_size = tile_size;
    }
    if matches.get_flag("parallel") {
        config.tile.parallel = true;
    }
    if matches.get_flag("crop") {
        config.tile.crop_to_source = true;
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.tile.seed = Some(seed);
    }
    config.validate()?;

    let inputs: Vec<PathBuf> = matches
        .get_many::<String>("inputs")
        .ok_or_else(|| anyhow!("입력 이미지가 필요합니다"))?
        .map(PathBuf::from)
        .collect();
    let output = matches.get_one::<String>("output").map(PathBuf::from);
    if output.is_some() && inputs.len() > 1 {
        bail!("--output은 입력 파일이 하나일 때만 사용할 수 있습니다");
    }

    let store = checkpoint_store(matches, &config)?;
    let checkpoint = store.load_latest()?;
    let transform = LanczosResidualTransform::new(checkpoint.codebook.dim())?;
    println!(
        "🔍 체크포인트 step {} ({}×{} 코드북)",
        checkpoint.step,
        checkpoint.codebook.len(),
        checkpoint.codebook.dim()
    );

    for input in &inputs {
        let saved = scale_file(input, output.as_deref(), &transform, &checkpoint.codebook, &config.tile)?;
        println!("✅ {} → {}", input.display(), saved.display());
    }
    Ok(())
}

fn handle_info(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let store = checkpoint_store(matches, &config)?;

    println!("📋 체크포인트 디렉토리: {}", store.dir().display());
    let checkpoints = store.list()?;
    if checkpoints.is_empty() {
        println!("저장된 체크포인트가 없습니다.");
        return Ok(());
    }
    for (step, path) in &checkpoints {
        println!("  step {:>8}: {}", step, path.display());
    }

    let latest = store.load_latest()?;
    println!("\n🏆 === 최신 체크포인트 ===");
    println!("스텝: {}", latest.step);
    println!("저장 시각: {}", latest.saved_at.to_rfc3339());
    println!("코드북: {}×{}", latest.codebook.len(), latest.codebook.dim());
    println!("코드북 분산: {:.4}", latest.codebook.spread());
    Ok(())
}
