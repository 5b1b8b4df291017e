fn main() -> anyhow::Result<()> {
    emoscan_lib::run()
}
