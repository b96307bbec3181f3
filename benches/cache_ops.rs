use criterion::{criterion_group, criterion_main, Criterion};
use gateway_cache::model::{Channel, Guild, Member, Role, User};
use gateway_cache::{CacheBuilder, MemberKey, ProxyCache};
use rand::Rng;
use std::hint::black_box;
use tokio::runtime::Runtime;

const GUILDS: u64 = 50;
const CHANNELS_PER_GUILD: u64 = 40;
const MEMBERS_PER_GUILD: u64 = 200;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn guild(id: u64) -> Guild {
    let mut guild = Guild::new(id).with_name(format!("guild-{}", id));
    for c in 0..CHANNELS_PER_GUILD {
        guild.insert_channel(Channel::new(id * 1_000 + c).with_name("channel"));
    }
    guild.insert_role(Role::new(id * 1_000_000).with_name("everyone"));
    for m in 0..MEMBERS_PER_GUILD {
        guild.insert_member(Member::new(id, m).with_roles(vec![id * 1_000_000]));
    }
    guild
}

fn populated(rt: &Runtime) -> ProxyCache {
    let cache = CacheBuilder::new().build();
    rt.block_on(async {
        for id in 1..=GUILDS {
            cache.guilds().set(guild(id)).await.expect("Failed to set guild");
        }
    });
    cache
}

fn bench_reads(c: &mut Criterion) {
    let rt = runtime();
    let cache = populated(&rt);
    let mut rng = rand::rng();

    c.bench_function("get/nested_channel", |b| {
        b.iter(|| {
            let guild_id = rng.random_range(1..=GUILDS);
            let channel_id = guild_id * 1_000 + rng.random_range(0..CHANNELS_PER_GUILD);
            let channel = rt
                .block_on(cache.channels().get(black_box(channel_id)))
                .expect("get failed");
            black_box(channel);
        });
    });

    c.bench_function("get/member", |b| {
        b.iter(|| {
            let key = MemberKey::new(
                rng.random_range(1..=GUILDS),
                rng.random_range(0..MEMBERS_PER_GUILD),
            );
            let member = rt
                .block_on(cache.members().get(black_box(key)))
                .expect("get failed");
            black_box(member);
        });
    });
}

fn bench_writes(c: &mut Criterion) {
    let rt = runtime();
    let cache = populated(&rt);
    let mut rng = rand::rng();

    c.bench_function("set/user_merge", |b| {
        b.iter(|| {
            let user = User::new(rng.random_range(0..10_000)).with_username("ferris");
            let outcome = rt
                .block_on(cache.users().set(black_box(user)))
                .expect("set failed");
            black_box(outcome);
        });
    });

    c.bench_function("set/guild_with_children", |b| {
        let payload = guild(GUILDS + 1);
        b.iter(|| {
            let outcome = rt
                .block_on(cache.guilds().set(black_box(payload.clone())))
                .expect("set failed");
            black_box(outcome);
        });
    });
}

fn bench_cascades(c: &mut Criterion) {
    let rt = runtime();

    c.bench_function("delete/guild_cascade", |b| {
        b.iter_batched(
            || populated(&rt),
            |cache| {
                rt.block_on(cache.guilds().delete(black_box(1)))
                    .expect("delete failed");
            },
            criterion::BatchSize::LargeInput,
        );
    });

    c.bench_function("delete/role_cascade", |b| {
        b.iter_batched(
            || populated(&rt),
            |cache| {
                rt.block_on(cache.roles().delete(black_box(1_000_000)))
                    .expect("delete failed");
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_reads, bench_writes, bench_cascades);
criterion_main!(benches);
