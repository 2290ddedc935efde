fn main() -> anyhow::Result<()> {
    cadence_lib::run()
}
