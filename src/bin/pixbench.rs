fn main() -> anyhow::Result<()> {
    pixbench::main()
}
