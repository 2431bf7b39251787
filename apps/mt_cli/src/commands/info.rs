// apps/mt_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示每种积分器下粒子交换记录的字段布局，以及默认运行配置。

use anyhow::{bail, Result};
use clap::Args;
use glam::{DVec2, DVec3};
use mt_config::{IntegratorKind, RunConfig};
use mt_foundation::SpaceVector;
use mt_particle::{build_integrator, DataFormat, Particle, RecordLayout};
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 空间维度 (2 或 3)
    #[arg(short, long, default_value = "2")]
    pub dimension: usize,

    /// 以 JSON 输出记录布局
    #[arg(long)]
    pub json: bool,

    /// 显示默认配置
    #[arg(long)]
    pub defaults: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== MantleTrace 信息 ===");

    match args.dimension {
        2 => print_layouts::<DVec2>(args.json)?,
        3 => print_layouts::<DVec3>(args.json)?,
        d => bail!("不支持的维度: {}", d),
    }

    if args.defaults {
        println!();
        print_default_config()?;
    }
    Ok(())
}

/// 某个积分器下的交换记录布局
fn exchange_layout<V: SpaceVector>(kind: IntegratorKind) -> RecordLayout {
    let mut fields = Particle::<V>::wire_fields(DataFormat::Exchange);
    fields.extend(build_integrator::<V>(kind).wire_fields(DataFormat::Exchange));
    RecordLayout::from_fields(fields)
}

fn print_layouts<V: SpaceVector>(json: bool) -> Result<()> {
    for kind in IntegratorKind::ALL {
        let layout = exchange_layout::<V>(kind);
        if json {
            println!("{}", serde_json::to_string_pretty(&layout)?);
            continue;
        }

        println!("=== {} ({}D, {} 字节/粒子) ===", kind, V::DIM, layout.record_size());
        println!("{:<12} {:>8} {:>6} {:>6}", "field", "offset", "count", "type");
        for (field, offset) in layout.fields().iter().zip(layout.offsets()) {
            println!(
                "{:<12} {:>8} {:>6} {:>6}",
                field.name,
                offset,
                field.count,
                format!("{:?}", field.dtype)
            );
        }
        println!();
    }
    Ok(())
}

fn print_default_config() -> Result<()> {
    println!("=== 默认配置 ===");
    println!("{}", serde_json::to_string_pretty(&RunConfig::default())?);
    Ok(())
}
